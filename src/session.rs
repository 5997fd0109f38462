use crate::constants::SESSION_KEY_LEN;
use crate::core_network::framer::Framer;
use crate::core_network::message::ControlMessage;
use crate::error::Result;
use rand::RngCore;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

/// Symmetric key handed to the peer at connect time. The core only issues
/// and stores it; any cipher using it sits below the framer.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey(Vec<u8>);

impl SessionKey {
    pub fn generate() -> Self {
        let mut key = vec![0u8; SESSION_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self(key)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey(<{} bytes>)", self.0.len())
    }
}

/// How sessions get their key, if at all.
#[derive(Debug, Clone)]
pub enum KeyIssuance {
    Disabled,
    Fixed(SessionKey),
    PerSession,
}

impl KeyIssuance {
    pub fn issue(&self) -> Option<SessionKey> {
        match self {
            KeyIssuance::Disabled => None,
            KeyIssuance::Fixed(key) => Some(key.clone()),
            KeyIssuance::PerSession => Some(SessionKey::generate()),
        }
    }
}

/// State of one accepted connection, from accept to close.
///
/// The carry-over buffer lives inside the framer, so it belongs to exactly
/// one session and goes away with it.
pub struct Session<S> {
    pub id: u64,
    pub peer: String,
    framer: Framer<S>,
    username: Option<String>,
    session_key: Option<SessionKey>,
    transfer_reported: bool,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(id: u64, peer: String, framer: Framer<S>) -> Self {
        Self {
            id,
            peer,
            framer,
            username: None,
            session_key: None,
            transfer_reported: false,
        }
    }

    pub fn framer(&mut self) -> &mut Framer<S> {
        &mut self.framer
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.username.is_some()
    }

    pub fn set_authenticated(&mut self, username: String) {
        self.username = Some(username);
    }

    pub fn session_key(&self) -> Option<&SessionKey> {
        self.session_key.as_ref()
    }

    pub fn set_session_key(&mut self, key: SessionKey) {
        self.session_key = Some(key);
    }

    /// Notes that the current command got past `READY` and reports itself
    /// as a transfer record.
    pub fn mark_transfer(&mut self) {
        self.transfer_reported = true;
    }

    /// Returns and clears the mark set by [`Session::mark_transfer`].
    pub fn take_transfer_mark(&mut self) -> bool {
        std::mem::take(&mut self.transfer_reported)
    }

    pub async fn read_line(&mut self) -> Result<Option<String>> {
        self.framer.read_line().await
    }

    pub async fn send(&mut self, message: &ControlMessage) -> Result<()> {
        self.framer.write_message(message).await
    }

    pub async fn reply_ok(&mut self, detail: impl Into<String>) -> Result<()> {
        self.send(&ControlMessage::ok(detail)).await
    }

    pub async fn reply_err(&mut self, detail: impl Into<String>) -> Result<()> {
        self.send(&ControlMessage::err(detail)).await
    }
}
