//! Replication configuration
//!
//! Loaded from RON, e.g.:
//!
//! ```ron
//! (
//!     normalization_tolerance: 0.001,
//!     enforce_ordering: true,
//!     representation_scale: 0.05,
//!     max_message_len: 256,
//! )
//! ```
//!
//! Every field is optional and falls back to its default.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Smallest payload that can hold a transform update
pub const MIN_MESSAGE_LEN: usize = 40;

/// Configuration for transform replication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Allowed deviation of an inbound rotation from unit length
    pub normalization_tolerance: f32,
    /// Discard updates older than the last accepted one for the same peer
    pub enforce_ordering: bool,
    /// Uniform scale applied to newly created representational objects
    pub representation_scale: f32,
    /// Inbound payloads longer than this are rejected
    pub max_message_len: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            normalization_tolerance: 1e-3,
            enforce_ordering: true,
            representation_scale: 0.05,
            max_message_len: 256,
        }
    }
}

impl ReplicationConfig {
    /// Parse and validate a RON document
    pub fn from_ron_str(content: &str) -> Result<Self> {
        let config: Self = ron::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a RON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_ron_str(&content)
    }

    /// Check that all values are usable
    pub fn validate(&self) -> Result<()> {
        if !(self.normalization_tolerance.is_finite() && self.normalization_tolerance > 0.0) {
            return Err(Error::Config(format!(
                "normalization_tolerance must be positive, got {}",
                self.normalization_tolerance
            )));
        }
        if !(self.representation_scale.is_finite() && self.representation_scale > 0.0) {
            return Err(Error::Config(format!(
                "representation_scale must be positive, got {}",
                self.representation_scale
            )));
        }
        if self.max_message_len < MIN_MESSAGE_LEN {
            return Err(Error::Config(format!(
                "max_message_len must be at least {}, got {}",
                MIN_MESSAGE_LEN, self.max_message_len
            )));
        }
        Ok(())
    }
}
