use crate::constants::{AUTH_FAIL, AUTH_OK, AUTH_PASSWORD, AUTH_USERNAME, ROLE_SERVER};
use crate::core_events::AuthOutcome;
use crate::core_network::message::ControlMessage;
use crate::error::{Result, XferError};
use crate::server::ServerContext;
use crate::session::Session;
use chrono::Local;
use log::{info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

enum HandshakeState {
    Start,
    AwaitingPassword { username: String },
    Verifying { username: String, password: String },
    Authenticated { username: String },
    Rejected { username: String },
}

/// Runs the four-step login exchange once.
///
/// On success the session carries the username. A rejected login has
/// already been answered with `AUTH@FAIL`; the caller closes the socket.
/// A peer that disconnects mid-handshake yields `ConnectionLost`.
pub async fn authenticate<S>(session: &mut Session<S>, ctx: &ServerContext) -> Result<AuthOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let started = Local::now();
    let mut state = HandshakeState::Start;

    loop {
        state = match state {
            HandshakeState::Start => {
                session.send(&ControlMessage::auth(AUTH_USERNAME)).await?;
                match read_step(session, ctx, "").await? {
                    Some(username) => HandshakeState::AwaitingPassword { username },
                    None => HandshakeState::Rejected {
                        username: String::new(),
                    },
                }
            }
            HandshakeState::AwaitingPassword { username } => {
                session.send(&ControlMessage::auth(AUTH_PASSWORD)).await?;
                match read_step(session, ctx, &username).await? {
                    Some(password) => HandshakeState::Verifying { username, password },
                    None => HandshakeState::Rejected { username },
                }
            }
            HandshakeState::Verifying { username, password } => {
                if !username.is_empty() && ctx.credentials.verify(&username, &password) {
                    HandshakeState::Authenticated { username }
                } else {
                    HandshakeState::Rejected { username }
                }
            }
            HandshakeState::Authenticated { username } => {
                session.send(&ControlMessage::auth(AUTH_OK)).await?;
                info!("[{}] Login successful for user: {}", session.peer, username);
                ctx.events.on_auth_result(
                    ROLE_SERVER,
                    &username,
                    AuthOutcome::Authenticated,
                    started,
                    Local::now(),
                );
                session.set_authenticated(username);
                return Ok(AuthOutcome::Authenticated);
            }
            HandshakeState::Rejected { username } => {
                session.send(&ControlMessage::auth(AUTH_FAIL)).await?;
                warn!("[{}] Failed login attempt for user: {}", session.peer, username);
                ctx.events.on_auth_result(
                    ROLE_SERVER,
                    &username,
                    AuthOutcome::Rejected,
                    started,
                    Local::now(),
                );
                return Ok(AuthOutcome::Rejected);
            }
        };
    }
}

/// Reads one handshake answer. A malformed answer is `None` and ends in a
/// rejection; a broken stream is an error.
async fn read_step<S>(
    session: &mut Session<S>,
    ctx: &ServerContext,
    username: &str,
) -> Result<Option<String>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match session.read_line().await {
        Ok(Some(line)) => Ok(Some(line)),
        Ok(None) => {
            report_disconnect(ctx, username);
            Err(XferError::ConnectionLost(
                "peer closed during authentication".to_string(),
            ))
        }
        Err(e) if e.is_fatal() => {
            report_disconnect(ctx, username);
            Err(e)
        }
        Err(e) => {
            warn!("[{}] Malformed handshake step: {}", session.peer, e);
            Ok(None)
        }
    }
}

fn report_disconnect(ctx: &ServerContext, username: &str) {
    let now = Local::now();
    ctx.events
        .on_auth_result(ROLE_SERVER, username, AuthOutcome::Disconnected, now, now);
}
