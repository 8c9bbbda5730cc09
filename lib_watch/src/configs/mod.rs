//! # Configuration Modules
//!
//! The tracked-collection model shared by the binaries and its JSON loader.

/// Collections to track: site, mode, watched and ignored tags.
pub mod config_watch;

pub use config_watch::{CollectionConfig, CollectionMode, ConfigError, WatchConfig};
