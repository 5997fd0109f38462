use anyhow::Result;
use clap::Parser;
use env_logger::{Builder, Env};
use rouillexferd::core_cli::Cli;
use rouillexferd::{server, Config};
use std::io::Write;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    // Initialize the logger with a custom format
    let default_level = if args.verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_level))
        .format(|buf, record| {
            let timestamp = buf.timestamp();
            writeln!(
                buf,
                "[{}] [{}] {}",
                timestamp,
                record.level(),
                record.args()
            )
        })
        .init();

    // Load configuration from the TOML file, or fall back to defaults
    let mut config = if args.config.is_empty() {
        Config::default()
    } else {
        Config::load_from_file(&args.config)?
    };

    if let Some(port) = args.port {
        config.server.listen_port = port;
    }
    if let Some(storage_root) = args.storage_root {
        config.server.storage_root = storage_root;
    }

    server::run(config).await
}
