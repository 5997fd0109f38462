use crate::constants::USERNAME_REGEX;
use crate::core_auth::core_auth::{CredentialRecord, PasswdFile};
use anyhow::{Context, Result};
use log::{info, warn};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs;

/// SHA-256 over the password bytes followed by the salt, hex encoded.
pub fn hash_password(password: &str, salt: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);
    hex::encode(hasher.finalize())
}

pub fn verify_password(password: &str, salt: &[u8], password_hash: &str) -> bool {
    let computed = hash_password(password, salt);
    // Compare every byte regardless of where the first mismatch is.
    computed.len() == password_hash.len()
        && computed
            .bytes()
            .zip(password_hash.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

pub fn parse_passwd(content: &str) -> Result<PasswdFile> {
    let username_re = Regex::new(USERNAME_REGEX).context("Invalid username pattern")?;
    let mut records = Vec::new();

    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match CredentialRecord::from_line(line) {
            Some(record) if username_re.is_match(record.get_username()) => records.push(record),
            _ => warn!("Skipping malformed credential line {}", number + 1),
        }
    }

    Ok(PasswdFile::from_records(records))
}

pub fn load_passwd_file(path: &str) -> Result<PasswdFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials file: {}", path))?;
    let passwd = parse_passwd(&content)?;
    info!("Loaded {} credential records from {}", passwd.len(), path);
    Ok(passwd)
}
