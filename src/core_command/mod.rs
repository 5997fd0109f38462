// The commands served after login, one file per command
pub mod command;
pub mod handlers;
pub mod upload;
pub mod download;
pub mod dele;
pub mod dir;
pub mod subfolder;

// Path helpers shared by the commands
pub mod utils;
