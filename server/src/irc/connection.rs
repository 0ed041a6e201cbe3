use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

use crate::config::BridgeConfig;
use crate::engine::context::SessionContext;
use crate::engine::registry::{SessionRegistry, SharedSession};
use crate::slack::client::{SlackApi, SlackClient};

use super::formatter;
use super::parser::IrcMessage;

/// Maximum bytes per IRC line (RFC 2812 says 512; Slack messages run longer).
const MAX_LINE_LENGTH: usize = 4096;
/// Clients that send nothing for this long are disconnected.
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_NICK_LENGTH: usize = 32;

/// Builds a Slack client from the token a client sent with PASS.
pub type SlackConnector = Arc<dyn Fn(&str) -> Result<Arc<dyn SlackApi>> + Send + Sync>;

/// Shared state every connection handler needs.
pub struct Gateway {
    pub registry: Arc<SessionRegistry>,
    pub server_name: String,
    connector: SlackConnector,
}

impl Gateway {
    pub fn new(config: &BridgeConfig, registry: Arc<SessionRegistry>) -> Self {
        let settings = config.slack.clone();
        let connector: SlackConnector = Arc::new(move |token: &str| -> Result<Arc<dyn SlackApi>> {
            let client: Arc<dyn SlackApi> = Arc::new(SlackClient::new(&settings, token)?);
            Ok(client)
        });
        Self::with_connector(config.server.server_name.clone(), registry, connector)
    }

    pub fn with_connector(
        server_name: String,
        registry: Arc<SessionRegistry>,
        connector: SlackConnector,
    ) -> Self {
        Self {
            registry,
            server_name,
            connector,
        }
    }
}

/// Read a line from the IRC connection, capped at MAX_LINE_LENGTH bytes.
/// Returns Ok(0) on EOF, Ok(n) on success, Err on I/O error or line too long.
async fn read_bounded_line<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
    buf: &mut String,
) -> std::io::Result<usize> {
    let mut pending = Vec::new();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(0);
        }
        if let Some(pos) = available.iter().position(|&b| b == b'\n') {
            if pending.len() + pos + 1 > MAX_LINE_LENGTH {
                reader.consume(pos + 1);
                return Err(line_too_long());
            }
            pending.extend_from_slice(&available[..=pos]);
            reader.consume(pos + 1);
            buf.push_str(&String::from_utf8_lossy(&pending));
            return Ok(pending.len());
        }
        let len = available.len();
        pending.extend_from_slice(available);
        reader.consume(len);
        if pending.len() >= MAX_LINE_LENGTH {
            return Err(line_too_long());
        }
    }
}

fn line_too_long() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, "IRC line exceeds maximum length")
}

fn is_valid_nick(nick: &str) -> bool {
    !nick.is_empty()
        && nick.len() <= MAX_NICK_LENGTH
        && !nick.starts_with(['#', '&', ':', '$'])
        && !nick.starts_with(|c: char| c.is_ascii_digit())
        && nick
            .chars()
            .all(|c| c.is_alphanumeric() || "-_.[]{}\\|^`".contains(c))
}

/// Registration fields collected before the client is bridged to Slack.
#[derive(Debug, Default)]
struct Registration {
    token: Option<String>,
    nick: Option<String>,
    username: Option<String>,
    real_name: String,
}

impl Registration {
    /// Apply one pre-registration command. Returns an error reply, if any.
    fn apply(&mut self, server: &str, msg: &IrcMessage) -> Option<String> {
        let current = self.nick.as_deref().unwrap_or("*");
        match msg.command.as_str() {
            "PASS" => match msg.params.first() {
                Some(token) => self.token = Some(token.clone()),
                None => return Some(formatter::err_needmoreparams(server, current, "PASS")),
            },
            "NICK" => match msg.params.first() {
                None => return Some(formatter::err_nonicknamegiven(server, current)),
                Some(wanted) if !is_valid_nick(wanted) => {
                    return Some(formatter::err_erroneusnickname(server, current, wanted));
                }
                Some(wanted) => self.nick = Some(wanted.clone()),
            },
            "USER" => {
                if msg.params.len() < 4 {
                    return Some(formatter::err_needmoreparams(server, current, "USER"));
                }
                self.username = Some(msg.params[0].clone());
                self.real_name = msg.params[3].clone();
            }
            // CAP negotiation and anything else is ignored until registered.
            _ => {}
        }
        None
    }

    fn is_complete(&self) -> bool {
        self.nick.is_some() && self.username.is_some()
    }
}

enum Opened {
    Session(SharedSession),
    /// Recoverable problem (e.g. nick taken); keep reading registration lines.
    Retry,
    Close,
}

/// Verify the Slack token, build the session context and register it.
async fn open_session(
    gateway: &Gateway,
    peer: SocketAddr,
    reg: &mut Registration,
    out_tx: &mpsc::UnboundedSender<String>,
) -> Opened {
    let server = gateway.server_name.as_str();
    let nick = reg.nick.clone().unwrap_or_default();

    if !gateway.registry.is_nick_available(&nick) {
        send_line(out_tx, &formatter::err_nicknameinuse(server, "*", &nick));
        reg.nick = None;
        return Opened::Retry;
    }

    let Some(token) = reg.token.as_deref() else {
        send_line(out_tx, &formatter::err_passwdmismatch(server, &nick, "no PASS token given"));
        return Opened::Close;
    };

    let slack = match (gateway.connector)(token) {
        Ok(client) => client,
        Err(e) => {
            warn!(%peer, error = %e, "failed to create Slack client");
            send_line(out_tx, &formatter::err_passwdmismatch(server, &nick, "client error"));
            return Opened::Close;
        }
    };

    let identity = match slack.auth_test().await {
        Ok(identity) => identity,
        Err(e) => {
            warn!(%peer, %nick, error = %e, "Slack auth.test failed");
            send_line(out_tx, &formatter::err_passwdmismatch(server, &nick, &e.to_string()));
            return Opened::Close;
        }
    };

    let mut ctx = SessionContext::new(
        peer,
        nick.clone(),
        reg.username.clone().unwrap_or_default(),
        reg.real_name.clone(),
        gateway.server_name.clone(),
        slack,
    );
    ctx.slack_connected = true;
    let mask = ctx.mask().await;
    let session_id = ctx.id;
    let session = Arc::new(Mutex::new(ctx));

    if !gateway.registry.claim_nick(&nick, session.clone()) {
        // Lost a race with another client registering the same nick.
        send_line(out_tx, &formatter::err_nicknameinuse(server, "*", &nick));
        reg.nick = None;
        return Opened::Retry;
    }
    gateway.registry.register_endpoint(peer, session.clone());

    send_line(out_tx, &formatter::rpl_welcome(server, &nick, &mask));
    send_line(out_tx, &formatter::rpl_yourhost(server, &nick, &identity.team));

    info!(%session_id, %peer, %nick, slack_user = %identity.user_id, "session registered");
    Opened::Session(session)
}

/// Handle a single IRC client connection from accept to close.
/// Accepts any stream implementing AsyncRead + AsyncWrite (plain TCP or TLS).
pub async fn handle_irc_connection<S>(stream: S, peer: SocketAddr, gateway: Arc<Gateway>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    info!(%peer, "IRC client connected");

    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let write_handle = tokio::spawn(async move {
        while let Some(line) = out_rx.recv().await {
            let data = format!("{}\r\n", line);
            if writer.write_all(data.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut line_buf = String::new();
    let mut reg = Registration::default();
    let server = gateway.server_name.as_str();

    let mut session = None;
    while session.is_none() {
        let Some(msg) = next_message(&mut reader, &mut line_buf).await else {
            break;
        };
        if msg.command == "QUIT" {
            break;
        }
        if let Some(reply) = reg.apply(server, &msg) {
            send_line(&out_tx, &reply);
            continue;
        }
        if reg.is_complete() {
            match open_session(&gateway, peer, &mut reg, &out_tx).await {
                Opened::Session(s) => session = Some(s),
                Opened::Retry => {}
                Opened::Close => break,
            }
        }
    }

    if let Some(session) = session {
        serve_session(&gateway, &session, &mut reader, &mut line_buf, &out_tx).await;

        let nick = session.lock().await.nick.clone();
        gateway.registry.unregister_session(&peer, &nick, &session);
        info!(%peer, %nick, "session closed");
    }

    drop(out_tx);
    let _ = write_handle.await;
    info!(%peer, "IRC client disconnected");
}

/// Command loop for a registered client.
async fn serve_session<R: AsyncRead + Unpin>(
    gateway: &Gateway,
    session: &SharedSession,
    reader: &mut BufReader<R>,
    line_buf: &mut String,
    out_tx: &mpsc::UnboundedSender<String>,
) {
    let server = gateway.server_name.as_str();

    while let Some(msg) = next_message(reader, line_buf).await {
        let mut ctx = session.lock().await;
        match msg.command.as_str() {
            "PING" => {
                let token = msg.params.first().map(String::as_str).unwrap_or(server);
                send_line(out_tx, &formatter::pong(server, token));
            }
            "QUIT" => {
                let reason = msg.params.first().map(String::as_str).unwrap_or("Client quit");
                send_line(out_tx, &formatter::error_closing(&ctx.nick, &format!("Quit: {reason}")));
                break;
            }
            "NICK" => {
                let Some(wanted) = msg.params.first() else {
                    send_line(out_tx, &formatter::err_nonicknamegiven(server, &ctx.nick));
                    continue;
                };
                if !is_valid_nick(wanted) {
                    send_line(out_tx, &formatter::err_erroneusnickname(server, &ctx.nick, wanted));
                    continue;
                }
                if let Err(e) = gateway.registry.rename_nick(&ctx.nick, wanted, session) {
                    info!(nick = %ctx.nick, %wanted, "{e}");
                    send_line(out_tx, &formatter::err_nicknameinuse(server, &ctx.nick, wanted));
                    continue;
                }
                let old_mask = ctx.mask().await;
                ctx.nick = wanted.clone();
                send_line(out_tx, &formatter::nick_change(&old_mask, wanted));
            }
            "PASS" | "USER" => {
                send_line(out_tx, &formatter::err_alreadyregistred(server, &ctx.nick));
            }
            other => {
                send_line(out_tx, &formatter::err_unknowncommand(server, &ctx.nick, other));
            }
        }
    }
}

/// Next parseable line, or None on EOF, I/O error, oversize line or idle timeout.
async fn next_message<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
    line_buf: &mut String,
) -> Option<IrcMessage> {
    loop {
        match tokio::time::timeout(IDLE_TIMEOUT, read_bounded_line(reader, line_buf)).await {
            Ok(Ok(0)) | Ok(Err(_)) | Err(_) => return None,
            Ok(Ok(_)) => {}
        }
        let line = line_buf.trim_end().to_string();
        line_buf.clear();

        if let Ok(msg) = IrcMessage::parse(&line) {
            return Some(msg);
        }
    }
}

fn send_line(tx: &mpsc::UnboundedSender<String>, line: &str) {
    let _ = tx.send(line.to_string());
}
