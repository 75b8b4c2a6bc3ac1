//! Error types for codecs, buffers and compression envelopes.

use crate::context::Format;
use playersync_schema::{MigrationError, SchemaVersion};

/// Errors that can occur while encoding or decoding PlayerSync data.
///
/// Structural variants (see [`SerializationError::is_structural`]) mean the
/// input bytes are corrupt or truncated. The remaining variants describe a
/// codec that cannot handle the request or a schema problem.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// A read needed more bytes than remain before the buffer limit
    #[error("buffer underflow: needed {needed} bytes but only {available} available")]
    BufferUnderflow { needed: usize, available: usize },

    /// A length prefix or payload exceeded its hard cap
    #[error("length {length} exceeds maximum of {max} bytes")]
    LengthExceeded { length: usize, max: usize },

    /// A length prefix decoded to a negative value
    #[error("negative length prefix: {0}")]
    NegativeLength(i32),

    /// A varint kept its continuation bit set past the width's byte budget
    #[error("malformed varint: continuation bit still set after {max_bytes} bytes")]
    MalformedVarInt { max_bytes: usize },

    /// String bytes were not valid UTF-8
    #[error("invalid UTF-8 string data: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// An enum wire tag had no matching variant
    #[error("unknown {type_name} wire tag {tag}")]
    UnknownTag { type_name: &'static str, tag: u32 },

    /// A buffer position was moved past the limit
    #[error("position {position} is beyond limit {limit}")]
    InvalidPosition { position: usize, limit: usize },

    /// A decoder finished before consuming all input
    #[error("{remaining} unexpected trailing bytes after decoded value")]
    TrailingBytes { remaining: usize },

    /// The codec does not implement the requested format
    #[error("format {format} is not supported by the serializer for {type_name}")]
    UnsupportedFormat { type_name: &'static str, format: Format },

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 text could not be decoded
    #[error("invalid Base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Text could not be represented in (or decoded from) a charset
    #[error("charset {charset} cannot represent the data: {reason}")]
    Charset { charset: &'static str, reason: String },

    /// Writing to a compressor failed
    #[error("compression failed: {0}")]
    Compression(#[source] std::io::Error),

    /// Reading from a decompressor failed
    #[error("decompression failed: {0}")]
    Decompression(#[source] std::io::Error),

    /// A compressed envelope was too short to carry its flag byte
    #[error("truncated envelope: expected a 1-byte header, got {0} bytes")]
    TruncatedEnvelope(usize),

    /// A compressed envelope carried a flag other than 0 or 1
    #[error("invalid envelope flag 0x{0:02X}")]
    InvalidEnvelopeFlag(u8),

    /// A codec rejected the decoded content
    #[error("malformed data: {0}")]
    Malformed(String),

    /// No serializer is registered for the requested type
    #[error("no serializer registered for {type_name}")]
    NotRegistered { type_name: &'static str },

    /// A versioned document was written by a newer schema than the reader knows
    #[error("document schema {found} is newer than supported schema {supported}")]
    NewerSchema {
        found: SchemaVersion,
        supported: SchemaVersion,
    },

    /// Migrating a versioned document failed
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),
}

impl SerializationError {
    /// Creates a [`SerializationError::Malformed`] error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Returns `true` for errors caused by corrupt or truncated input bytes.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::BufferUnderflow { .. }
                | Self::LengthExceeded { .. }
                | Self::NegativeLength(_)
                | Self::MalformedVarInt { .. }
                | Self::InvalidUtf8(_)
                | Self::UnknownTag { .. }
                | Self::TrailingBytes { .. }
                | Self::TruncatedEnvelope(_)
                | Self::InvalidEnvelopeFlag(_)
                | Self::Decompression(_)
        )
    }
}

/// Convenience alias for codec results.
pub type Result<T> = std::result::Result<T, SerializationError>;

/// Errors raised while loading or validating codec settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to write configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
