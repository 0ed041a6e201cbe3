use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::rustls::ServerConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::connection::{Gateway, handle_irc_connection};

/// Build a TLS acceptor from PEM certificate chain and private key files.
pub fn load_tls_acceptor(cert_path: &str, key_path: &str) -> Result<TlsAcceptor> {
    let certs = rustls_pemfile::certs(&mut BufReader::new(
        File::open(cert_path).with_context(|| format!("failed to open {cert_path}"))?,
    ))
    .collect::<Result<Vec<_>, _>>()
    .with_context(|| format!("failed to parse certificates in {cert_path}"))?;

    let key = rustls_pemfile::private_key(&mut BufReader::new(
        File::open(key_path).with_context(|| format!("failed to open {key_path}"))?,
    ))
    .with_context(|| format!("failed to parse private key in {key_path}"))?
    .ok_or_else(|| anyhow!("no private key found in {key_path}"))?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("invalid TLS certificate/key pair")?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Start the IRC TCP listener. Accepts connections and spawns a handler task for each.
/// If a TLS acceptor is provided, connections are wrapped in TLS.
/// Stops accepting new connections when the cancellation token is triggered.
pub async fn start_irc_listener(
    bind_addr: &str,
    gateway: Arc<Gateway>,
    cancel: CancellationToken,
    tls_acceptor: Option<TlsAcceptor>,
) -> Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind IRC listener on {bind_addr}"))?;

    if tls_acceptor.is_some() {
        info!("IRC listener started on {} (TLS enabled)", bind_addr);
    } else {
        info!("IRC listener started on {} (plaintext)", bind_addr);
    }

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(sessions = gateway.registry.session_count(), "IRC listener shutting down");
                break;
            }
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let gateway = gateway.clone();
                        if let Some(ref acceptor) = tls_acceptor {
                            let acceptor = acceptor.clone();
                            tokio::spawn(async move {
                                match acceptor.accept(stream).await {
                                    Ok(tls_stream) => {
                                        handle_irc_connection(tls_stream, peer, gateway).await;
                                    }
                                    Err(e) => {
                                        warn!(%peer, error = %e, "TLS handshake failed");
                                    }
                                }
                            });
                        } else {
                            tokio::spawn(handle_irc_connection(stream, peer, gateway));
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "failed to accept IRC connection");
                    }
                }
            }
        }
    }

    Ok(())
}
