use std::path::PathBuf;

use clap::Parser;

/// Atelier generation orchestrator
#[derive(Debug, Parser)]
#[command(name = "atelier", about = "AI image generation orchestrator for the gallery")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "atelier.toml", env = "ATELIER_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "ATELIER_LISTEN")]
    pub listen: Option<std::net::SocketAddr>,
}
