use crate::core_command::command::SubfolderAction;
use crate::core_command::handlers::Outcome;
use crate::core_command::utils::resolve_in_root;
use crate::error::{Result, XferError};
use crate::server::ServerContext;
use log::info;
use tokio::fs;

/// Handles `SUBFOLDER@create@<name>` (idempotent) and
/// `SUBFOLDER@delete@<name>` (empty folders only).
pub async fn handle_subfolder_command(
    ctx: &ServerContext,
    action: SubfolderAction,
    name: &str,
) -> Result<Outcome> {
    let path = resolve_in_root(&ctx.storage_root, name)?;
    let existing = fs::metadata(&path).await.ok();

    match action {
        SubfolderAction::Create => {
            if existing.as_ref().map(|m| !m.is_dir()).unwrap_or(false) {
                return Err(XferError::Policy(format!(
                    "A file named '{}' already exists.",
                    name
                )));
            }
            fs::create_dir_all(&path).await?;
            info!("Directory created: {:?}", path);
            Ok(Outcome::Reply(format!("Subfolder '{}' created.", name)))
        }
        SubfolderAction::Delete => {
            if !existing.map(|m| m.is_dir()).unwrap_or(false) {
                return Err(XferError::NotFound("Subfolder not found.".to_string()));
            }
            if fs::read_dir(&path).await?.next_entry().await?.is_some() {
                return Err(XferError::Policy(format!(
                    "Subfolder '{}' is not empty.",
                    name
                )));
            }
            fs::remove_dir(&path).await?;
            info!("Directory removed: {:?}", path);
            Ok(Outcome::Reply(format!("Subfolder '{}' deleted.", name)))
        }
    }
}
