//! Configuration types for statecap

use serde::{Deserialize, Serialize};

use crate::{CaptureError, Result};

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Resource limits
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Indexed reader behavior
    #[serde(default)]
    pub reader: ReaderConfig,
    /// Dump rendering
    #[serde(default)]
    pub view: ViewConfig,
}

/// Resource limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest chunk payload accepted by the readers
    pub max_chunk_octets: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_chunk_octets: 64 * 1024 * 1024, // 64 MB
        }
    }
}

/// Indexed reader behavior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Fail to open a capture that holds no state chunks
    pub require_states: bool,
    /// Fail to open a capture whose packet/state timestamps decrease
    pub enforce_monotonic: bool,
}

/// Dump rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Print a hex dump of each payload
    pub hex_dump: bool,
    /// Print a base64 line for each payload
    pub base64: bool,
    /// Payload bytes rendered before clipping
    pub max_dump_octets: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            hex_dump: true,
            base64: true,
            max_dump_octets: 4096,
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CaptureError::ConfigError(format!("Failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| CaptureError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_chunk_octets == 0 {
            return Err(CaptureError::ConfigError(
                "limits.max_chunk_octets must be > 0".to_string(),
            ));
        }

        if self.view.max_dump_octets == 0 {
            return Err(CaptureError::ConfigError(
                "view.max_dump_octets must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
