use crate::constants::PART_SUFFIX;
use crate::error::XferError;
use std::path::{Component, Path, PathBuf};

/// Resolves a client supplied name under the storage root.
///
/// Only plain relative components are accepted, so the result can never
/// point outside `root`.
pub fn resolve_in_root(root: &Path, name: &str) -> Result<PathBuf, XferError> {
    let relative = Path::new(name.trim());
    if relative.as_os_str().is_empty() {
        return Err(XferError::Protocol("Missing file name.".to_string()));
    }

    let mut path = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => {
                return Err(XferError::Policy(
                    "Path is outside of the storage area.".to_string(),
                ))
            }
        }
    }

    if path == root {
        return Err(XferError::Protocol("Missing file name.".to_string()));
    }
    Ok(path)
}

/// Hidden sibling that receives an upload until the payload is complete.
pub fn part_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}{}", name, PART_SUFFIX))
}

pub fn is_part_file(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(PART_SUFFIX)
}
