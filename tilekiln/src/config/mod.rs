//! User configuration stored in `~/.tilekiln/config.ini`.
//!
//! # Example
//!
//! ```ignore
//! use tilekiln::config::{ConfigFile, ConfigKey};
//!
//! let mut config = ConfigFile::load()?;
//! ConfigKey::RenderConcurrency.set(&mut config, "4")?;
//! config.save()?;
//! ```

mod defaults;
mod file;
mod keys;
mod parser;
mod settings;
mod writer;

pub use defaults::{default_temp_dir, DEFAULT_LOG_FILE, DEFAULT_OUTPUT_DIR, DEFAULT_PIXEL_RATIO};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use keys::{ConfigKey, ConfigKeyError};
pub use settings::{ConfigFile, LoggingSettings, OutputSettings, RenderSettings, StyleSettings};
