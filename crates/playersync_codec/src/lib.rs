//! # PlayerSync Codec
//!
//! Serialization core for moving player records between game servers.
//!
//! The crate is organised around the [`Serializer`] contract: every codec
//! turns values into a string form and a byte form, driven entirely by an
//! immutable [`SerializationContext`]. On top of that sit:
//!
//! - [`BinaryBuffer`] - positioned byte buffer with varints, length-prefixed
//!   strings, UUIDs and tagged enums
//! - [`JsonSerializer`] and [`BinarySerializer`] - ready-made codecs for serde
//!   types and hand-written binary layouts
//! - [`CompressedSerializer`] - threshold-based GZIP / fast deflate envelope
//!   around any codec
//! - [`VersionedSerializer`] - stamps documents with a [`SchemaVersion`] and
//!   migrates older ones on read
//! - [`SerializerRegistry`] - type-keyed lookup of codecs
//! - [`CodecSettings`] - TOML configuration for the above
//!
//! ## Quick Start
//!
//! ```rust
//! use playersync_codec::{JsonSerializer, SerializationContext, Serializer};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Position {
//!     x: f64,
//!     y: f64,
//!     z: f64,
//! }
//!
//! let serializer = JsonSerializer::<Position>::new();
//! let context = SerializationContext::json();
//!
//! let spawn = Position { x: 0.5, y: 64.0, z: -0.5 };
//! let text = serializer.serialize(&spawn, &context)?;
//! assert_eq!(serializer.deserialize(&text, &context)?, spawn);
//!
//! let encoded = serializer.to_base64(&spawn, &context)?;
//! assert_eq!(serializer.from_base64(&encoded, &context)?, spawn);
//! # Ok::<(), playersync_codec::SerializationError>(())
//! ```

pub mod binary;
pub mod buffer;
pub mod compression;
pub mod config;
pub mod context;
pub mod error;
pub mod json;
pub mod registry;
pub mod serializer;
pub mod versioned;

pub use binary::{BinaryCodec, BinarySerializer};
pub use buffer::{BinaryBuffer, ByteOrder, WireTag};
pub use compression::CompressedSerializer;
pub use config::{CodecSettings, CompressionSettings};
pub use context::{Charset, CompressionType, Format, SerializationContext, SerializationContextBuilder};
pub use error::{ConfigError, Result, SerializationError};
pub use json::JsonSerializer;
pub use registry::SerializerRegistry;
pub use serializer::{MappedSerializer, Serializer, TargetType};
pub use versioned::VersionedSerializer;

pub use playersync_schema::{MigrationError, SchemaMigration, SchemaVersion};
