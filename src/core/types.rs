//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// A side (player slot) in a match, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SideNumber(pub u32);

impl SideNumber {
    pub fn new(side: u32) -> Self {
        Self(side)
    }

    /// Side 0 is reserved for the command AI in console commands
    pub fn is_valid(&self) -> bool {
        self.0 >= 1
    }
}

impl Default for SideNumber {
    fn default() -> Self {
        Self(1)
    }
}

impl fmt::Display for SideNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SideNumber {
    fn from(side: u32) -> Self {
        Self(side)
    }
}

/// Algorithm assigned when a configuration names none
pub const AI_TYPE_DEFAULT: &str = "default";

/// Version stamped onto serialized, fully built configurations
pub const CONFIG_VERSION: &str = "10703";
