use clap::Parser;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "rouillexferd",
    about = "A session-oriented file transfer server written in Rust."
)]
pub struct Cli {
    /// Path to the configuration file (built-in defaults when empty)
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Port to listen on, overrides the configuration file
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Storage root directory, overrides the configuration file
    #[arg(short, long)]
    pub storage_root: Option<String>,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,
}
