//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::path::PathBuf;
use std::process;

use tilekiln::config::ConfigFileError;
use tilekiln::coord::CoordError;
use tilekiln::pipeline::PipelineError;
use tilekiln::style::StyleError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Invalid bounds or zoom arguments
    Range(CoordError),
    /// Failed to build the style document
    Style(StyleError),
    /// The generation run failed
    Generation(PipelineError),
    /// The archive was written but some tiles are missing
    PartialOutput { failed: usize, path: PathBuf },
    /// The archive could not be moved to the output directory
    Move { message: String, path: PathBuf },
    /// Failed to read or write a file
    File { path: PathBuf, error: std::io::Error },
    /// Failed to start the async runtime
    Runtime(std::io::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::PartialOutput { .. } => {
                eprintln!();
                eprintln!("Failed tiles are listed in the log. To accept an incomplete");
                eprintln!("archive, rerun with --allow-partial.");
            }
            CliError::Move { path, .. } => {
                eprintln!();
                eprintln!("The finished archive was kept at: {}", path.display());
            }
            CliError::Generation(PipelineError::Pool(_)) => {
                eprintln!();
                eprintln!("Try a lower --concurrency if the renderer ran out of resources.");
            }
            CliError::Generation(PipelineError::TileFailed(_)) => {
                eprintln!();
                eprintln!("The run stopped at the first failed tile (--fail-fast or");
                eprintln!("failure_policy = abort). The partial archive is in the temp directory.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Range(e) => write!(f, "{}", e),
            CliError::Style(e) => write!(f, "Failed to build style: {}", e),
            CliError::Generation(e) => write!(f, "Generation failed ({}): {}", e.stage(), e),
            CliError::PartialOutput { failed, path } => write!(
                f,
                "{} tile(s) failed to render; incomplete archive at {}",
                failed,
                path.display()
            ),
            CliError::Move { message, .. } => write!(f, "{}", message),
            CliError::File { path, error } => {
                write!(f, "Failed to access '{}': {}", path.display(), error)
            }
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Range(e) => Some(e),
            CliError::Style(e) => Some(e),
            CliError::Generation(e) => Some(e),
            CliError::File { error, .. } => Some(error),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<CoordError> for CliError {
    fn from(e: CoordError) -> Self {
        CliError::Range(e)
    }
}

impl From<StyleError> for CliError {
    fn from(e: StyleError) -> Self {
        CliError::Style(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Generation(e)
    }
}
