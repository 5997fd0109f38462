use crate::core_auth::handshake::authenticate;
use crate::core_command::handlers::run_command_loop;
use crate::core_events::AuthOutcome;
use crate::core_network::framer::Framer;
use crate::core_network::message::ControlMessage;
use crate::error::{Result as XferResult, XferError};
use crate::server::ServerContext;
use crate::session::Session;
use anyhow::{Context, Result};
use log::{error, info, warn};
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Accepts connections forever, one task per connection.
pub async fn start_server(address: &str, ctx: Arc<ServerContext>) -> Result<()> {
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("Server listening on {}", address);
    serve(listener, ctx).await
}

pub async fn serve(listener: TcpListener, ctx: Arc<ServerContext>) -> Result<()> {
    let listener = &listener;
    accept_loop(
        move || async move {
            let (socket, addr) = listener.accept().await?;
            if let Err(e) = socket.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
            }
            Ok::<_, io::Error>((socket, addr.to_string()))
        },
        ctx,
    )
    .await
}

/// Runs `accept` forever and spawns a session task per connection.
///
/// An accept error (`EMFILE`, `ECONNABORTED`, ...) only affects that one
/// attempt; the loop logs it, pauses briefly and keeps accepting.
pub async fn accept_loop<F, Fut, S>(mut accept: F, ctx: Arc<ServerContext>) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<(S, String)>>,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    loop {
        let (stream, peer) = match accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                continue;
            }
        };
        info!("New connection from {}", peer);

        let ctx = Arc::clone(&ctx);
        tokio::spawn(async move {
            match handle_connection(stream, peer.clone(), &ctx).await {
                Ok(()) => {}
                Err(e @ XferError::Auth(_)) => warn!("Closing {}: {}", peer, e),
                Err(e) => error!("Connection error for {}: {}", peer, e),
            }
            info!("Connection closed for {}", peer);
        });
    }
}

/// Drives one session from accept to close: optional session key, login,
/// then the command loop.
pub async fn handle_connection<S>(stream: S, peer: String, ctx: &ServerContext) -> XferResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let framer = Framer::new(stream, ctx.max_line_length, ctx.idle_timeout);
    let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
    let mut session = Session::new(id, peer, framer);

    let result = run_session(&mut session, ctx).await;
    // Best effort; the peer may already be gone.
    let _ = session.framer().shutdown().await;
    result
}

async fn run_session<S>(session: &mut Session<S>, ctx: &ServerContext) -> XferResult<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Some(key) = ctx.key_issuance.issue() {
        session.set_session_key(key);
    }
    if let Some(key) = session.session_key() {
        let announce = ControlMessage::key(key.to_hex());
        session.send(&announce).await?;
    }

    match authenticate(session, ctx).await? {
        AuthOutcome::Authenticated => {}
        _ => {
            return Err(XferError::Auth(format!(
                "session {} rejected",
                session.id
            )))
        }
    }

    run_command_loop(session, ctx).await
}
