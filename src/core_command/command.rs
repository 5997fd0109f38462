use crate::core_network::message::ControlMessage;
use crate::error::XferError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubfolderAction {
    Create,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Upload { filename: String, size: u64 },
    Download { filename: String },
    Delete { name: String },
    Dir { subfolder: Option<String> },
    Subfolder { action: SubfolderAction, name: String },
    Logout,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Upload { .. } => "UPLOAD",
            Command::Download { .. } => "DOWNLOAD",
            Command::Delete { .. } => "DELETE",
            Command::Dir { .. } => "DIR",
            Command::Subfolder { .. } => "SUBFOLDER",
            Command::Logout => "LOGOUT",
        }
    }

    pub fn from_message(message: &ControlMessage) -> Result<Command, XferError> {
        match message.tag.to_ascii_uppercase().as_str() {
            "UPLOAD" => {
                let filename = required(message, 0, "Usage: UPLOAD@<filename>@<size>")?;
                let size = required(message, 1, "Usage: UPLOAD@<filename>@<size>")?
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| XferError::Protocol("Invalid file size.".to_string()))?;
                Ok(Command::Upload { filename, size })
            }
            "DOWNLOAD" => Ok(Command::Download {
                filename: required(message, 0, "Usage: DOWNLOAD@<filename>")?,
            }),
            "DELETE" => Ok(Command::Delete {
                name: required(message, 0, "Usage: DELETE@<filename>")?,
            }),
            "DIR" => Ok(Command::Dir {
                subfolder: message
                    .arg(0)
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string),
            }),
            "SUBFOLDER" => {
                let usage = "Usage: SUBFOLDER@<create|delete>@<name>";
                let action = match required(message, 0, usage)?.to_ascii_lowercase().as_str() {
                    "create" => SubfolderAction::Create,
                    "delete" => SubfolderAction::Delete,
                    _ => return Err(XferError::Protocol("Invalid subfolder command.".to_string())),
                };
                let name = required(message, 1, usage)?;
                Ok(Command::Subfolder { action, name })
            }
            "LOGOUT" => Ok(Command::Logout),
            _ => Err(XferError::Protocol("Unknown command".to_string())),
        }
    }
}

fn required(message: &ControlMessage, index: usize, usage: &str) -> Result<String, XferError> {
    message
        .arg(index)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| XferError::Protocol(usage.to_string()))
}
