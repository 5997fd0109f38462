// Error handling for the control protocol and the transfer engine
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XferError {
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Policy violation: {0}")]
    Policy(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Transfer truncated: expected {expected} bytes, received {received}")]
    Truncated { expected: u64, received: u64 },

    #[error("Control line exceeds {0} bytes")]
    LineTooLong(usize),

    #[error("No data from peer within {0:?}")]
    Timeout(Duration),
}

impl XferError {
    /// Fatal errors leave the stream in an unknown position, so the session
    /// is torn down without sending a reply.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            XferError::ConnectionLost(_)
                | XferError::Truncated { .. }
                | XferError::LineTooLong(_)
                | XferError::Timeout(_)
        )
    }

    /// Detail text sent to the peer after `ERR@`.
    pub fn to_response(&self) -> String {
        match self {
            XferError::Protocol(msg)
            | XferError::Auth(msg)
            | XferError::NotFound(msg)
            | XferError::Policy(msg) => msg.clone(),
            XferError::Io(e) => match e.kind() {
                std::io::ErrorKind::PermissionDenied => "Permission denied.".to_string(),
                std::io::ErrorKind::NotFound => "File not found.".to_string(),
                _ => format!("Local error in processing: {}", e),
            },
            _ => "Transfer aborted.".to_string(),
        }
    }
}

pub type Result<T, E = XferError> = std::result::Result<T, E>;
