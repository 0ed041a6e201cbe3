use std::fmt;

/// One IRC line: `[:prefix] COMMAND [params...] [:trailing]`.
#[derive(Debug, Clone, PartialEq)]
pub struct IrcMessage {
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcMessage {
    /// Parse a line with or without its CRLF terminator.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let (prefix, rest) = match line.strip_prefix(':') {
            Some(tagged) => {
                let (prefix, rest) = tagged.split_once(' ').ok_or(ParseError::MissingCommand)?;
                (Some(prefix.to_string()), rest.trim_start())
            }
            None => (None, line),
        };

        let (command, mut rest) = rest.split_once(' ').unwrap_or((rest, ""));
        if command.is_empty() {
            return Err(ParseError::MissingCommand);
        }

        let mut params = Vec::new();
        loop {
            rest = rest.trim_start_matches(' ');
            if rest.is_empty() {
                break;
            }
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            let (param, remaining) = rest.split_once(' ').unwrap_or((rest, ""));
            params.push(param.to_string());
            rest = remaining;
        }

        Ok(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }

    /// A reply originating from the gateway itself.
    pub fn from_server(server_name: &str, command: &str, params: Vec<String>) -> Self {
        Self {
            prefix: Some(server_name.to_string()),
            command: command.to_string(),
            params,
        }
    }

    /// Wire form without CRLF. CR/LF inside parameters are replaced with
    /// spaces so Slack content can't inject extra lines.
    pub fn format(&self) -> String {
        let mut out = String::with_capacity(128);
        if let Some(prefix) = &self.prefix {
            out.push(':');
            out.push_str(prefix);
            out.push(' ');
        }
        out.push_str(&self.command);

        let last = self.params.len().saturating_sub(1);
        for (i, param) in self.params.iter().enumerate() {
            out.push(' ');
            if i == last && (param.is_empty() || param.contains(' ') || param.starts_with(':')) {
                out.push(':');
            }
            out.push_str(&param.replace(['\r', '\n'], " "));
        }
        out
    }
}

#[derive(Debug, PartialEq)]
pub enum ParseError {
    Empty,
    MissingCommand,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "empty line"),
            ParseError::MissingCommand => write!(f, "missing command"),
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_registration_lines() {
        let pass = IrcMessage::parse("PASS xoxp-1234-abcd\r\n").unwrap();
        assert_eq!(pass.command, "PASS");
        assert_eq!(pass.params, vec!["xoxp-1234-abcd"]);

        let user = IrcMessage::parse("USER alice 0 * :Alice Liddell").unwrap();
        assert_eq!(user.params, vec!["alice", "0", "*", "Alice Liddell"]);
    }

    #[test]
    fn test_parse_prefix_and_lowercase_command() {
        let msg = IrcMessage::parse(":alice!U1@10.0.0.1 nick  ally").unwrap();
        assert_eq!(msg.prefix.as_deref(), Some("alice!U1@10.0.0.1"));
        assert_eq!(msg.command, "NICK");
        assert_eq!(msg.params, vec!["ally"]);
    }

    #[test]
    fn test_parse_no_params_and_empty_trailing() {
        assert!(IrcMessage::parse("QUIT").unwrap().params.is_empty());
        assert_eq!(IrcMessage::parse("QUIT :").unwrap().params, vec![""]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(IrcMessage::parse(""), Err(ParseError::Empty));
        assert_eq!(IrcMessage::parse("  \r\n"), Err(ParseError::Empty));
        assert_eq!(IrcMessage::parse(":prefix"), Err(ParseError::MissingCommand));
    }

    #[test]
    fn test_format_trailing_and_sanitize() {
        let msg = IrcMessage::from_server(
            "slirc",
            "NOTICE",
            vec!["alice".into(), "line one\r\nline two".into()],
        );
        assert_eq!(msg.format(), ":slirc NOTICE alice :line one  line two");

        let pong = IrcMessage::from_server("slirc", "PONG", vec!["slirc".into(), "tok".into()]);
        assert_eq!(pong.format(), ":slirc PONG slirc tok");
    }

    #[test]
    fn test_parse_then_format_is_stable() {
        let line = ":slirc 001 alice :Welcome to slirc, alice!U1@127.0.0.1";
        assert_eq!(IrcMessage::parse(line).unwrap().format(), line);
    }
}
