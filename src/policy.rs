// Size policy: which file extensions are accepted and how small they may be
use crate::constants::{GIB, KIB, MIB};
use crate::error::XferError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtensionClass {
    pub name: String,
    pub extensions: Vec<String>,
    pub min_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SizePolicy {
    pub classes: Vec<ExtensionClass>,
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self {
            classes: vec![
                ExtensionClass {
                    name: "Text".to_string(),
                    extensions: vec!["txt".to_string()],
                    min_bytes: 25 * MIB,
                },
                ExtensionClass {
                    name: "Audio".to_string(),
                    extensions: vec!["mp3".to_string(), "wav".to_string()],
                    min_bytes: GIB,
                },
                ExtensionClass {
                    name: "Video".to_string(),
                    extensions: vec!["mp4".to_string(), "mkv".to_string(), "avi".to_string()],
                    min_bytes: 2 * GIB,
                },
            ],
        }
    }
}

impl SizePolicy {
    /// Looks up the class of `filename` by its extension, ignoring case.
    pub fn classify(&self, filename: &str) -> Option<&ExtensionClass> {
        let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
        self.classes
            .iter()
            .find(|class| class.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)))
    }

    /// Rejects extensions outside the allow-list.
    pub fn check_type(&self, filename: &str) -> Result<&ExtensionClass, XferError> {
        self.classify(filename)
            .ok_or_else(|| XferError::Policy("Unsupported file type.".to_string()))
    }

    /// Rejects files below their class minimum.
    pub fn check_size(&self, filename: &str, size: u64) -> Result<(), XferError> {
        let class = self.check_type(filename)?;
        if size < class.min_bytes {
            return Err(XferError::Policy(format!(
                "{} file too small (min {}).",
                class.name,
                format_size(class.min_bytes)
            )));
        }
        Ok(())
    }
}

pub fn format_size(bytes: u64) -> String {
    if bytes >= GIB && bytes % GIB == 0 {
        format!("{} GiB", bytes / GIB)
    } else if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MiB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{} KiB", bytes / KIB)
    } else {
        format!("{} bytes", bytes)
    }
}
