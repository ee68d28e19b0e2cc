use clap::Parser;
use std::path::PathBuf;

/// Command-line flags. Parsed before any configuration is loaded, so
/// `--help` and `--list-devices` work without an API key.
#[derive(Parser, Debug)]
#[command(name = "storyteller", about = "Interactive bedtime stories, told out loud")]
pub struct Cli {
    /// Output device to narrate on. Defaults to AUDIO_OUTPUT_DEVICE, then the system default.
    #[arg(long)]
    pub device: Option<String>,
    /// Print the available output devices and exit.
    #[arg(long)]
    pub list_devices: bool,
    /// Directory holding the prompt templates.
    #[arg(long)]
    pub prompts: Option<PathBuf>,
}
