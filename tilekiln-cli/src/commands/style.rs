//! Style command - print the style document a run would render with.

use std::path::PathBuf;

use clap::Args;
use tilekiln::config::ConfigFile;

use super::common::{remove_overlay_copy, StyleArgs};
use crate::error::CliError;

/// Arguments for the style command.
#[derive(Debug, Args)]
pub struct StyleCommandArgs {
    #[command(flatten)]
    pub style: StyleArgs,

    /// Write the document to FILE instead of stdout
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Run the style command.
pub fn run(args: StyleCommandArgs) -> Result<(), CliError> {
    let config = ConfigFile::load().unwrap_or_default();
    let temp_dir = args.style.temp_dir(&config);

    let built = args.style.build(&config);
    if args.style.overlay.is_some() {
        remove_overlay_copy(&temp_dir);
    }
    let document = built?.to_pretty_string();

    match args.output {
        Some(path) => {
            std::fs::write(&path, document + "\n")
                .map_err(|error| CliError::File { path: path.clone(), error })?;
            println!("Style written to {}", path.display());
        }
        None => println!("{}", document),
    }

    Ok(())
}
