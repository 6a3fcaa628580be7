use std::path::PathBuf;

use clap::Parser;

/// Moonshot chat client
#[derive(Debug, Parser)]
#[command(name = "moonshot", about = "Send a prompt to the Moonshot chat API, running tools until it finishes")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "moonshot.toml", env = "MOONSHOT_CONFIG")]
    pub config: PathBuf,

    /// Print the answer incrementally as it arrives
    #[arg(long)]
    pub stream: bool,

    /// System message placed before the prompt
    #[arg(long)]
    pub system: Option<String>,

    /// Override the configured model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Log filter directive
    #[arg(long, default_value = "warn", env = "MOONSHOT_LOG")]
    pub log: String,

    /// Prompt text
    pub prompt: String,
}
