//! Command line interface

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "triage-server")]
#[command(about = "Support ticket triage API", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    pub config: String,

    /// SQLite database URL
    #[arg(short, long)]
    pub database_url: Option<String>,

    /// Listen address
    #[arg(short = 'l', long, default_value = "0.0.0.0")]
    pub listen: String,

    /// Listen port
    #[arg(short = 'P', long, default_value = "8080")]
    pub port: u16,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
