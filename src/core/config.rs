//! Manager configuration with documented defaults
//!
//! Collected here so a session can be tuned from a single TOML file
//! instead of scattered constants.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::error::{AiError, Result};
use crate::core::types::AI_TYPE_DEFAULT;

/// Configuration for an AI manager session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Enables debug-only diagnostics (component tree printer, component lookup)
    pub debug: bool,

    /// Maximum number of console commands kept in history
    ///
    /// When exceeded, the older half of the history is dropped at once.
    pub history_size: usize,

    /// Number of history entries shown by the `?` console command
    pub history_visible: usize,

    /// Number of applied directives each holder remembers for diagnostics
    ///
    /// The journal is never replayed; it only feeds the debug printer.
    pub journal_size: usize,

    /// Algorithm name assigned to holders created without an explicit one
    pub default_algorithm: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            debug: false,
            history_size: 200,
            history_visible: 30,
            journal_size: 32,
            default_algorithm: AI_TYPE_DEFAULT.to_string(),
        }
    }
}

impl ManagerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Same as default, with debug diagnostics enabled
    pub fn debug() -> Self {
        Self {
            debug: true,
            ..Self::default()
        }
    }

    /// Load from a TOML file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: ManagerConfig = toml::from_str(&contents)?;
        config.validate().map_err(AiError::Configuration)?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.history_size < 2 {
            return Err(format!(
                "history_size ({}) must be at least 2 so pruning keeps an entry",
                self.history_size
            ));
        }

        if self.history_visible == 0 {
            return Err("history_visible must be positive".into());
        }

        if self.default_algorithm.trim().is_empty() {
            return Err("default_algorithm must not be empty".into());
        }

        Ok(())
    }
}
