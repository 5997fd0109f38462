pub mod config;
pub mod constants;
pub mod core_auth;
pub mod core_cli;
pub mod core_command;
pub mod core_events;
pub mod core_network;
pub mod error;
pub mod policy;
pub mod server;
pub mod session;

pub use config::Config;
pub use error::XferError;
