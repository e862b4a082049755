//! tilekiln CLI - Command-line interface
//!
//! Renders map tiles for a bounding box and zoom range into MBTiles archives.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::generate::GenerateArgs;
use commands::plan::PlanArgs;
use commands::style::StyleCommandArgs;

#[derive(Parser)]
#[command(name = "tilekiln")]
#[command(version, about = "Pre-render map tiles into MBTiles archives", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a bounding box and zoom range into an MBTiles archive
    Generate(GenerateArgs),

    /// Print the style document a generate run would use
    Style(StyleCommandArgs),

    /// Show how many tiles a bounding box covers per zoom level
    Plan(PlanArgs),

    /// View and modify configuration settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate(args) => commands::generate::run(args),
        Commands::Style(args) => commands::style::run(args),
        Commands::Plan(args) => commands::plan::run(args),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
