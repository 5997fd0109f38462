use crate::core_command::handlers::Outcome;
use crate::core_command::utils::resolve_in_root;
use crate::error::{Result, XferError};
use crate::server::ServerContext;
use log::info;
use tokio::fs;

/// Handles `DELETE@<name>`: removes a regular file under the storage root.
pub async fn handle_dele_command(ctx: &ServerContext, name: &str) -> Result<Outcome> {
    let path = resolve_in_root(&ctx.storage_root, name)?;

    match fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        _ => return Err(XferError::NotFound("File not found.".to_string())),
    }

    fs::remove_file(&path).await?;
    info!("File deleted: {:?}", path);
    Ok(Outcome::Reply(format!("Deleted {}", name)))
}
