use crate::core_auth::helper::verify_password;
use std::collections::HashMap;

/// One line of the credential file: `username:password_hash_hex:salt_hex`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    username: String,
    password_hash: String,
    salt: Vec<u8>,
}

impl CredentialRecord {
    pub fn new(username: &str, password_hash: &str, salt: Vec<u8>) -> Self {
        Self {
            username: username.to_string(),
            password_hash: password_hash.to_ascii_lowercase(),
            salt,
        }
    }

    pub fn from_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.trim().split(':').collect();
        if parts.len() != 3 || parts[0].is_empty() {
            return None;
        }
        let hash = hex::decode(parts[1]).ok()?;
        if hash.len() != 32 {
            return None;
        }
        let salt = hex::decode(parts[2]).ok()?;
        Some(Self::new(parts[0], parts[1], salt))
    }

    pub fn get_username(&self) -> &str {
        &self.username
    }

    pub fn get_password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn get_salt(&self) -> &[u8] {
        &self.salt
    }
}

/// Read-only lookup of credential records by exact username.
pub trait CredentialStore: Send + Sync {
    fn lookup(&self, username: &str) -> Option<&CredentialRecord>;

    /// Unknown users and wrong passwords look the same to the caller.
    fn verify(&self, username: &str, password: &str) -> bool {
        self.lookup(username)
            .map(|record| verify_password(password, record.get_salt(), record.get_password_hash()))
            .unwrap_or(false)
    }
}

#[derive(Debug, Default, Clone)]
pub struct PasswdFile {
    entries: HashMap<String, CredentialRecord>,
}

impl PasswdFile {
    pub fn from_records(records: impl IntoIterator<Item = CredentialRecord>) -> Self {
        let entries = records
            .into_iter()
            .map(|r| (r.get_username().to_string(), r))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialStore for PasswdFile {
    fn lookup(&self, username: &str) -> Option<&CredentialRecord> {
        self.entries.get(username)
    }
}
