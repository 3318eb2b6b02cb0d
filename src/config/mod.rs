//! Configuration module for Serial-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! including the per-host site profiles consumed by the scraping strategies.
//!
//! # Example
//!
//! ```no_run
//! use serial_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Default concurrency: {}", config.harvester.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{BrowserConfig, Config, HarvesterConfig, OutputConfig, SiteProfile, SiteSelectors};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
