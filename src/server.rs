use crate::config::Config;
use crate::core_auth::core_auth::CredentialStore;
use crate::core_auth::helper::load_passwd_file;
use crate::core_events::{EventSink, LogEventSink};
use crate::core_network::network;
use crate::policy::SizePolicy;
use crate::session::{KeyIssuance, SessionKey};
use anyhow::{Context, Result};
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Everything a session needs that is shared, read-only, across sessions.
pub struct ServerContext {
    pub storage_root: PathBuf,
    pub policy: SizePolicy,
    pub credentials: Arc<dyn CredentialStore>,
    pub events: Arc<dyn EventSink>,
    pub chunk_size: usize,
    pub max_line_length: usize,
    pub idle_timeout: Option<Duration>,
    pub key_issuance: KeyIssuance,
}

impl ServerContext {
    pub fn from_config(
        config: &Config,
        credentials: Arc<dyn CredentialStore>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let key_issuance = match (config.server.issue_session_key, &config.server.session_key) {
            (false, _) => KeyIssuance::Disabled,
            (true, Some(hex_key)) => KeyIssuance::Fixed(SessionKey::from_bytes(
                hex::decode(hex_key).context("session_key is not valid hex")?,
            )),
            (true, None) => KeyIssuance::PerSession,
        };

        Ok(Self {
            storage_root: PathBuf::from(&config.server.storage_root),
            policy: config.policy.clone(),
            credentials,
            events,
            chunk_size: config.server.chunk_size,
            max_line_length: config.server.max_line_length,
            idle_timeout: config.server.idle_timeout(),
            key_issuance,
        })
    }
}

/// Loads credentials, prepares the storage root and runs the accept loop.
pub async fn run(config: Config) -> Result<()> {
    log_config(&config);

    std::fs::create_dir_all(&config.server.storage_root).with_context(|| {
        format!(
            "Failed to create storage root: {}",
            config.server.storage_root
        )
    })?;

    let credentials = load_passwd_file(&config.server.credentials_file)?;
    if credentials.is_empty() {
        warn!(
            "No users in {}; every login will be rejected",
            config.server.credentials_file
        );
    }
    let mut context = ServerContext::from_config(
        &config,
        Arc::new(credentials),
        Arc::new(LogEventSink),
    )?;
    context.storage_root = context
        .storage_root
        .canonicalize()
        .with_context(|| format!("Failed to resolve storage root: {}", config.server.storage_root))?;

    let address = format!(
        "{}:{}",
        config.server.listen_address, config.server.listen_port
    );
    if let Err(e) = network::start_server(&address, Arc::new(context)).await {
        error!("Server stopped: {:#}", e);
        return Err(e);
    }
    Ok(())
}

pub fn log_config(config: &Config) {
    info!("  Listen Address: {}", config.server.listen_address);
    info!("  Listen Port: {}", config.server.listen_port);
    info!("  Storage Root: {}", config.server.storage_root);
    info!("  Credentials File: {}", config.server.credentials_file);
    info!("  Chunk Size: {} KB", config.server.chunk_size / 1024);
    match config.server.idle_timeout() {
        Some(timeout) => info!("  Idle Timeout: {}s", timeout.as_secs()),
        None => info!("  Idle Timeout: none"),
    }
    info!("  Session Key: {}", config.server.issue_session_key);
    for class in &config.policy.classes {
        info!(
            "  Policy {}: {:?} min {}",
            class.name,
            class.extensions,
            crate::policy::format_size(class.min_bytes)
        );
    }
}
