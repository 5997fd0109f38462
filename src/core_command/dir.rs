use crate::core_command::handlers::Outcome;
use crate::core_command::utils::{is_part_file, resolve_in_root};
use crate::error::{Result, XferError};
use crate::server::ServerContext;
use tokio::fs;

/// Handles `DIR` and `DIR@<subfolder>`.
///
/// Entries are sorted and newline-joined; directories carry a trailing `/`.
/// In-flight upload temp files are not listed.
pub async fn handle_dir_command(ctx: &ServerContext, subfolder: Option<&str>) -> Result<Outcome> {
    let dir = match subfolder {
        Some(name) => resolve_in_root(&ctx.storage_root, name)?,
        None => ctx.storage_root.clone(),
    };
    if !fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Err(XferError::NotFound("Subfolder not found.".to_string()));
    }

    let mut names = Vec::new();
    let mut entries = fs::read_dir(&dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let mut name = entry.file_name().to_string_lossy().into_owned();
        if is_part_file(&name) {
            continue;
        }
        if entry.file_type().await?.is_dir() {
            name.push('/');
        }
        names.push(name);
    }
    names.sort();

    if names.is_empty() {
        Ok(Outcome::Reply("Directory is empty.".to_string()))
    } else {
        Ok(Outcome::Reply(names.join("\n")))
    }
}
