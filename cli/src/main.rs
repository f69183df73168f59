use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::convert;

#[derive(Parser)]
#[command(name = "wwriff")]
#[command(about = "Reconstruct Ogg/Vorbis streams from Wwise-RIFF audio", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert Wwise-RIFF audio to a standard format
    #[command(subcommand)]
    Convert(convert::ConvertCommands),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert(cmd) => convert::handle(cmd),
    }
}
