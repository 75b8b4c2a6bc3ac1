//! Codec settings loaded from TOML.
//!
//! A server's codec defaults live in a small TOML file next to its other
//! configuration:
//!
//! ```toml
//! [serialization]
//! format = "BINARY"
//! compression = "GZIP"
//! schema_version = "2.1.0"
//!
//! [serialization.properties]
//! server = "lobby-1"
//!
//! [compression]
//! threshold = 256
//! max_decompressed_len = 67108864
//! ```
//!
//! Every key is optional and falls back to the same defaults as
//! [`SerializationContext::default`].

use crate::compression::{CompressedSerializer, DEFAULT_MAX_DECOMPRESSED_LEN, DEFAULT_THRESHOLD};
use crate::context::SerializationContext;
use crate::error::ConfigError;
use crate::serializer::Serializer;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

fn default_threshold() -> usize {
    DEFAULT_THRESHOLD
}

fn default_max_decompressed_len() -> usize {
    DEFAULT_MAX_DECOMPRESSED_LEN
}

/// Top-level codec configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodecSettings {
    /// Context handed to codecs by default
    #[serde(default)]
    pub serialization: SerializationContext,
    /// Tuning for the compression envelope
    #[serde(default)]
    pub compression: CompressionSettings,
}

/// Compression envelope tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionSettings {
    /// Payloads shorter than this many bytes are stored raw
    #[serde(default = "default_threshold")]
    pub threshold: usize,
    /// Largest decompressed payload accepted, in bytes
    #[serde(default = "default_max_decompressed_len")]
    pub max_decompressed_len: usize,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            max_decompressed_len: DEFAULT_MAX_DECOMPRESSED_LEN,
        }
    }
}

impl CodecSettings {
    /// Loads settings from a TOML file.
    ///
    /// If the file doesn't exist, writes the defaults to `path` and returns
    /// them.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml_str(&content)
        } else {
            let defaults = Self::default();
            std::fs::write(path, defaults.to_toml_string()?)?;
            info!("Created default codec configuration file: {}", path.display());
            Ok(defaults)
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks the settings for values the codecs cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.compression.threshold == 0 {
            return Err(ConfigError::Invalid(
                "compression.threshold must be greater than zero".to_string(),
            ));
        }

        if self.compression.max_decompressed_len < self.compression.threshold {
            return Err(ConfigError::Invalid(format!(
                "compression.max_decompressed_len ({}) must be at least compression.threshold ({})",
                self.compression.max_decompressed_len, self.compression.threshold
            )));
        }

        Ok(())
    }

    pub fn to_context(&self) -> SerializationContext {
        self.serialization.clone()
    }

    /// Wraps `delegate` in a compression envelope configured from these
    /// settings.
    pub fn compressed<T, S>(&self, delegate: S) -> CompressedSerializer<T, S>
    where
        S: Serializer<T>,
    {
        CompressedSerializer::for_context(delegate, &self.serialization)
            .with_threshold(self.compression.threshold)
            .with_max_decompressed_len(self.compression.max_decompressed_len)
    }
}
