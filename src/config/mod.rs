//! Watcher Configuration Module
//!
//! Provides the process configuration loaded from a TOML file.
//!
//! ## Loading Order
//!
//! 1. `--config` CLI flag (explicit path, errors are fatal)
//! 2. `SIRENWATCH_CONFIG` environment variable (path to TOML file)
//! 3. `sirenwatch.toml` in the current working directory
//! 4. Built-in defaults
//!
//! The loaded [`WatchConfig`] is passed by reference into every component at
//! startup; nothing reads configuration from a global.

mod watch_config;
pub mod defaults;
pub mod validation;

pub use watch_config::*;
