use crate::constants::ROLE_SERVER;
use crate::core_command::command::Command;
use crate::core_command::{dele, dir, download, subfolder, upload};
use crate::core_events::EventRecord;
use crate::core_network::message::ControlMessage;
use crate::error::{Result, XferError};
use crate::server::ServerContext;
use crate::session::Session;
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

/// What a handler asks the dispatcher to do once it returns successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Send `OK@<detail>`.
    Reply(String),
    /// The handler already finished the exchange (a download payload).
    Silent,
    /// Say goodbye and end the session.
    Logout,
}

pub async fn dispatch_command<S>(
    session: &mut Session<S>,
    ctx: &ServerContext,
    command: Command,
) -> Result<Outcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match command {
        Command::Upload { filename, size } => {
            upload::handle_upload_command(session, ctx, &filename, size).await
        }
        Command::Download { filename } => {
            download::handle_download_command(session, ctx, &filename).await
        }
        Command::Delete { name } => dele::handle_dele_command(ctx, &name).await,
        Command::Dir { subfolder } => dir::handle_dir_command(ctx, subfolder.as_deref()).await,
        Command::Subfolder { action, name } => {
            subfolder::handle_subfolder_command(ctx, action, &name).await
        }
        Command::Logout => Ok(Outcome::Logout),
    }
}

/// Serves commands until `LOGOUT`, end of stream, or a fatal error.
///
/// One control line is read per iteration and fully handled before the next
/// read. Handler errors become a single `ERR@` line and the loop goes on;
/// fatal errors end the session without a reply.
pub async fn run_command_loop<S>(session: &mut Session<S>, ctx: &ServerContext) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if !session.is_authenticated() {
        return Err(XferError::Auth(format!(
            "session {} has not logged in",
            session.id
        )));
    }

    loop {
        let line = match session.read_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!("[{}] Client disconnected", session.peer);
                return Ok(());
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                session.reply_err(e.to_response()).await?;
                continue;
            }
        };
        debug!("[{}] Received command: {}", session.peer, line);

        let started = Local::now();
        let message = ControlMessage::parse(&line);
        let (name, result) = match Command::from_message(&message) {
            Ok(command) => {
                let name = command.name().to_string();
                (name, dispatch_command(session, ctx, command).await)
            }
            Err(e) => (message.tag.to_ascii_uppercase(), Err(e)),
        };
        // Transfers past READY already produced a transfer record.
        let reported = session.take_transfer_mark();

        match result {
            Ok(Outcome::Reply(detail)) => {
                if !reported {
                    record(ctx, &name, started, "OK", &detail);
                }
                session.reply_ok(detail).await?;
            }
            Ok(Outcome::Silent) => {}
            Ok(Outcome::Logout) => {
                session.reply_ok("Logged out.").await?;
                record(ctx, &name, started, "OK", "");
                info!(
                    "[{}] User {} logged out",
                    session.peer,
                    session.username().unwrap_or("-")
                );
                return Ok(());
            }
            Err(e) if e.is_fatal() => {
                if !reported {
                    record(ctx, &name, started, "FAILED", &e.to_string());
                }
                return Err(e);
            }
            Err(e) => {
                warn!("[{}] {} failed: {}", session.peer, name, e);
                if !reported {
                    record(ctx, &name, started, "ERR", &e.to_response());
                }
                session.reply_err(e.to_response()).await?;
            }
        }
    }
}

fn record(ctx: &ServerContext, event: &str, start: DateTime<Local>, status: &str, note: &str) {
    ctx.events.record_event(EventRecord {
        role: ROLE_SERVER.to_string(),
        event: event.to_string(),
        start,
        end: Local::now(),
        status: status.to_string(),
        note: note.to_string(),
    });
}
