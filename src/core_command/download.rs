use crate::constants::{READY, ROLE_SERVER};
use crate::core_command::handlers::Outcome;
use crate::core_command::utils::resolve_in_root;
use crate::core_events::TransferRecord;
use crate::error::{Result, XferError};
use crate::server::ServerContext;
use crate::session::Session;
use chrono::Local;
use log::{error, info};
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

/// Handles `DOWNLOAD@<filename>`.
///
/// Replies `OK@<size>`, waits for `READY`, then streams exactly `size` bytes
/// with no trailing control message. Files the size policy would not have
/// accepted on upload are not served.
pub async fn handle_download_command<S>(
    session: &mut Session<S>,
    ctx: &ServerContext,
    filename: &str,
) -> Result<Outcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let path = resolve_in_root(&ctx.storage_root, filename)?;
    let size = match fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => return Err(XferError::NotFound("File not found.".to_string())),
    };
    ctx.policy.check_size(filename, size)?;
    let mut file = File::open(&path).await?;

    session.reply_ok(size.to_string()).await?;
    let ack = session.read_line().await?.ok_or_else(|| {
        XferError::ConnectionLost("peer closed before READY".to_string())
    })?;
    if ack.trim() != READY {
        info!("[{}] Download of {} cancelled by peer", session.peer, filename);
        return Ok(Outcome::Reply("Download cancelled.".to_string()));
    }

    session.mark_transfer();
    info!("[{}] DOWNLOAD {} ({} bytes)", session.peer, filename, size);
    let started = Local::now();
    let mut buffer = vec![0u8; size.min(ctx.chunk_size as u64) as usize];
    let mut sent: u64 = 0;

    while sent < size {
        let want = (size - sent).min(buffer.len() as u64) as usize;
        let n = match file.read(&mut buffer[..want]).await {
            Ok(n) => n,
            Err(e) => {
                error!("Error reading {:?}: {}", path, e);
                0
            }
        };
        if n == 0 {
            // The peer is waiting for the announced byte count; the only
            // signal left is dropping the connection.
            report(ctx, filename, sent, started, "FAILED");
            return Err(XferError::Truncated {
                expected: size,
                received: sent,
            });
        }
        if let Err(e) = session.framer().write_payload(&buffer[..n]).await {
            report(ctx, filename, sent, started, "FAILED");
            return Err(e);
        }
        sent += n as u64;
    }
    session.framer().flush().await?;

    report(ctx, filename, sent, started, "OK");
    info!("[{}] Sent {} ({} bytes)", session.peer, filename, sent);
    Ok(Outcome::Silent)
}

fn report(
    ctx: &ServerContext,
    filename: &str,
    bytes: u64,
    start: chrono::DateTime<Local>,
    status: &str,
) {
    ctx.events.record_transfer(TransferRecord {
        role: ROLE_SERVER.to_string(),
        operation: "DOWNLOAD".to_string(),
        filename: filename.to_string(),
        bytes,
        start,
        end: Local::now(),
        status: status.to_string(),
    });
}
