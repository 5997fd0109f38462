pub mod core_auth;
pub mod handshake;
pub mod helper;
