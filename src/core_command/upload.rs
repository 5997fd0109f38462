use crate::constants::{READY, ROLE_SERVER};
use crate::core_command::handlers::Outcome;
use crate::core_command::utils::{part_path, resolve_in_root};
use crate::core_events::TransferRecord;
use crate::error::{Result, XferError};
use crate::server::ServerContext;
use crate::session::Session;
use chrono::{DateTime, Local};
use log::{error, info, warn};
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Handles `UPLOAD@<filename>@<size>`.
///
/// The payload is written to a hidden `.part` sibling and renamed over the
/// destination only once every declared byte has arrived and its real size
/// on disk passes the size policy. A rejected or broken upload only ever
/// removes the `.part` file, so an existing file is kept intact.
///
/// Returns the `OK@` detail, or an error that the dispatcher turns into
/// `ERR@...` (or a teardown, for a broken stream).
pub async fn handle_upload_command<S>(
    session: &mut Session<S>,
    ctx: &ServerContext,
    filename: &str,
    declared_size: u64,
) -> Result<Outcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    ctx.policy.check_type(filename)?;
    let destination = resolve_in_root(&ctx.storage_root, filename)?;
    info!(
        "[{}] UPLOAD {} ({} bytes declared)",
        session.peer, filename, declared_size
    );

    match fs::metadata(&destination).await {
        Ok(meta) if meta.is_dir() => {
            return Err(XferError::Policy(format!("'{}' is a directory.", filename)));
        }
        Ok(_) => {
            session.reply_err("File exists. Overwrite? (y/n)").await?;
            let answer = session.read_line().await?.ok_or_else(|| {
                XferError::ConnectionLost("peer closed at overwrite prompt".to_string())
            })?;
            if !is_affirmative(&answer) {
                info!("[{}] Upload of {} cancelled", session.peer, filename);
                return Ok(Outcome::Reply("Upload cancelled.".to_string()));
            }
        }
        Err(_) => {}
    }

    if let Some(parent) = destination.parent() {
        if !fs::metadata(parent).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(XferError::NotFound("Subfolder not found.".to_string()));
        }
    }

    // Created before READY so a disk failure is still reported cleanly.
    let part = part_path(&destination);
    let mut file = File::create(&part).await?;

    session.reply_ok(READY).await?;
    session.mark_transfer();
    let started = Local::now();

    let received = receive_payload(session, &mut file, declared_size, ctx.chunk_size).await;
    drop(file);
    if let Err(e) = received {
        error!("[{}] Upload of {} failed: {}", session.peer, filename, e);
        remove_part(&part).await;
        report(ctx, filename, 0, started, "FAILED");
        return Err(e);
    }

    let actual_size = fs::metadata(&part).await?.len();
    if let Err(e) = ctx.policy.check_size(filename, actual_size) {
        warn!(
            "[{}] Discarding {}: {} bytes is below the policy minimum",
            session.peer, filename, actual_size
        );
        remove_part(&part).await;
        report(ctx, filename, actual_size, started, "REJECTED");
        return Err(e);
    }

    if let Err(e) = fs::rename(&part, &destination).await {
        remove_part(&part).await;
        report(ctx, filename, actual_size, started, "FAILED");
        return Err(e.into());
    }

    report(ctx, filename, actual_size, started, "OK");
    info!("[{}] Uploaded {} ({} bytes)", session.peer, filename, actual_size);
    Ok(Outcome::Reply(format!("Uploaded {}", filename)))
}

/// Copies exactly `declared_size` payload bytes from the session into `file`.
///
/// A disk failure does not stop the reads: the rest of the payload is still
/// consumed so the next control line starts where the peer expects it.
async fn receive_payload<S>(
    session: &mut Session<S>,
    file: &mut File,
    declared_size: u64,
    chunk_size: usize,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; declared_size.min(chunk_size as u64) as usize];
    let mut received: u64 = 0;
    let mut disk_error = None;

    while received < declared_size {
        let n = (declared_size - received).min(buffer.len() as u64) as usize;
        if let Err(e) = session.framer().read_exact_into(&mut buffer[..n]).await {
            return Err(match e {
                XferError::Truncated { received: got, .. } => XferError::Truncated {
                    expected: declared_size,
                    received: received + got,
                },
                other => other,
            });
        }
        received += n as u64;

        if disk_error.is_none() {
            if let Err(e) = file.write_all(&buffer[..n]).await {
                error!("Error writing upload to disk: {}", e);
                disk_error = Some(e);
            }
        }
    }

    if let Some(e) = disk_error {
        return Err(e.into());
    }
    file.flush().await?;
    Ok(())
}

async fn remove_part(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        error!("Failed to remove upload temp file {:?}: {}", path, e);
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn report(ctx: &ServerContext, filename: &str, bytes: u64, start: DateTime<Local>, status: &str) {
    ctx.events.record_transfer(TransferRecord {
        role: ROLE_SERVER.to_string(),
        operation: "UPLOAD".to_string(),
        filename: filename.to_string(),
        bytes,
        start,
        end: Local::now(),
        status: status.to_string(),
    });
}
