use super::numerics::*;
use super::parser::IrcMessage;

/// Helpers that build reply lines (caller appends \r\n). The server name is
/// per-session since it comes from configuration.
fn reply(server: &str, numeric: &str, params: Vec<String>) -> String {
    IrcMessage::from_server(server, numeric, params).format()
}

/// :slirc 001 nick :Welcome to slirc, nick!user@host
pub fn rpl_welcome(server: &str, nick: &str, mask: &str) -> String {
    reply(
        server,
        RPL_WELCOME,
        vec![nick.into(), format!("Welcome to {server}, {mask}")],
    )
}

/// :slirc 002 nick :Your host is slirc, bridging Slack team <team>
pub fn rpl_yourhost(server: &str, nick: &str, team: &str) -> String {
    reply(
        server,
        RPL_YOURHOST,
        vec![
            nick.into(),
            format!("Your host is {server}, bridging Slack team {team}"),
        ],
    )
}

pub fn err_unknowncommand(server: &str, nick: &str, command: &str) -> String {
    reply(
        server,
        ERR_UNKNOWNCOMMAND,
        vec![nick.into(), command.into(), "Unknown command".into()],
    )
}

pub fn err_nonicknamegiven(server: &str, nick: &str) -> String {
    reply(
        server,
        ERR_NONICKNAMEGIVEN,
        vec![nick.into(), "No nickname given".into()],
    )
}

pub fn err_erroneusnickname(server: &str, nick: &str, wanted: &str) -> String {
    reply(
        server,
        ERR_ERRONEUSNICKNAME,
        vec![nick.into(), wanted.into(), "Erroneous nickname".into()],
    )
}

pub fn err_nicknameinuse(server: &str, nick: &str, wanted: &str) -> String {
    reply(
        server,
        ERR_NICKNAMEINUSE,
        vec![nick.into(), wanted.into(), "Nickname is already in use".into()],
    )
}

pub fn err_needmoreparams(server: &str, nick: &str, command: &str) -> String {
    reply(
        server,
        ERR_NEEDMOREPARAMS,
        vec![nick.into(), command.into(), "Not enough parameters".into()],
    )
}

pub fn err_alreadyregistred(server: &str, nick: &str) -> String {
    reply(
        server,
        ERR_ALREADYREGISTRED,
        vec![nick.into(), "You may not reregister".into()],
    )
}

/// Sent when the PASS token is missing or Slack rejects it.
pub fn err_passwdmismatch(server: &str, nick: &str, reason: &str) -> String {
    reply(
        server,
        ERR_PASSWDMISMATCH,
        vec![nick.into(), format!("Slack authentication failed: {reason}")],
    )
}

/// :old!user@host NICK new
pub fn nick_change(old_mask: &str, new_nick: &str) -> String {
    IrcMessage {
        prefix: Some(old_mask.into()),
        command: "NICK".into(),
        params: vec![new_nick.into()],
    }
    .format()
}

pub fn pong(server: &str, token: &str) -> String {
    IrcMessage::from_server(server, "PONG", vec![server.into(), token.into()]).format()
}

pub fn error_closing(nick: &str, reason: &str) -> String {
    IrcMessage {
        prefix: None,
        command: "ERROR".into(),
        params: vec![format!("Closing Link: {nick} ({reason})")],
    }
    .format()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welcome_uses_mask() {
        assert_eq!(
            rpl_welcome("slirc", "alice", "alice!U1@127.0.0.1"),
            ":slirc 001 alice :Welcome to slirc, alice!U1@127.0.0.1"
        );
    }

    #[test]
    fn test_yourhost() {
        assert_eq!(
            rpl_yourhost("irc.example.org", "alice", "acme"),
            ":irc.example.org 002 alice :Your host is irc.example.org, bridging Slack team acme"
        );
    }

    #[test]
    fn test_error_numerics() {
        assert_eq!(
            err_nicknameinuse("slirc", "*", "bob"),
            ":slirc 433 * bob :Nickname is already in use"
        );
        assert_eq!(
            err_unknowncommand("slirc", "alice", "JOIN"),
            ":slirc 421 alice JOIN :Unknown command"
        );
        assert_eq!(
            err_needmoreparams("slirc", "*", "USER"),
            ":slirc 461 * USER :Not enough parameters"
        );
        assert_eq!(
            err_passwdmismatch("slirc", "alice", "invalid_auth"),
            ":slirc 464 alice :Slack authentication failed: invalid_auth"
        );
        assert_eq!(
            err_nonicknamegiven("slirc", "*"),
            ":slirc 431 * :No nickname given"
        );
    }

    #[test]
    fn test_nick_change_and_pong() {
        assert_eq!(
            nick_change("alice!U1@10.0.0.1", "ally"),
            ":alice!U1@10.0.0.1 NICK ally"
        );
        assert_eq!(pong("slirc", "12345"), ":slirc PONG slirc 12345");
    }

    #[test]
    fn test_error_closing() {
        assert_eq!(
            error_closing("alice", "Quit: bye"),
            "ERROR :Closing Link: alice (Quit: bye)"
        );
    }
}
