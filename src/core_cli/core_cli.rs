use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "gestorftpd", about = "A FTP server with an administrative console.")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the listening port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Override the served root directory
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Start the server before opening the console
    #[arg(short, long)]
    pub autostart: bool,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,
}
