pub mod framer;
pub mod message;
pub mod network;
