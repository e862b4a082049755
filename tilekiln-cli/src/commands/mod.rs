//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (get, set, list, path)
//! - [`generate`] - Render a bounding box into an MBTiles archive
//! - [`plan`] - Tile counts per zoom level
//! - [`style`] - Print the effective style document

pub mod common;
pub mod config;
pub mod generate;
pub mod plan;
pub mod style;
