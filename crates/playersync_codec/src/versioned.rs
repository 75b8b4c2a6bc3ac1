//! # Versioned Documents
//!
//! [`VersionedSerializer`] stamps every record with the schema version it was
//! written under and upgrades older records on read using a shared
//! [`SchemaMigration`] registry.
//!
//! JSON form:
//!
//! ```text
//! { "schema_version": "1.2.0", "data": { ... } }
//! ```
//!
//! Binary form: `string(schema_version) || bytes(compact JSON of data)`.

use crate::buffer::BinaryBuffer;
use crate::context::{Format, SerializationContext};
use crate::error::{Result, SerializationError};
use crate::serializer::{decode_base64, encode_base64, Serializer, TargetType};
use playersync_schema::{MigrationError, SchemaMigration, SchemaVersion};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct VersionedDocument {
    schema_version: SchemaVersion,
    data: Value,
}

/// Serializer that records schema versions and migrates on read.
///
/// Reading a document stamped with version `stored`:
///
/// - `stored == current`: decoded as-is
/// - `stored > current`: fails with [`SerializationError::NewerSchema`]
/// - a migration path exists: migrated to `current`, then decoded
/// - no path, but `current` is compatible with `stored` (same major): decoded
///   as-is, relying on the change being additive
/// - otherwise: fails with [`MigrationError::NoPath`]
pub struct VersionedSerializer<T> {
    migrations: Arc<SchemaMigration<Value>>,
    current: SchemaVersion,
    _marker: PhantomData<fn() -> T>,
}

impl<T> VersionedSerializer<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    pub fn new(migrations: Arc<SchemaMigration<Value>>, current: SchemaVersion) -> Self {
        Self {
            migrations,
            current,
            _marker: PhantomData,
        }
    }

    /// Uses the context's schema version as the current version.
    pub fn for_context(migrations: Arc<SchemaMigration<Value>>, context: &SerializationContext) -> Self {
        Self::new(migrations, context.schema_version().clone())
    }

    pub fn current_version(&self) -> &SchemaVersion {
        &self.current
    }

    pub fn migrations(&self) -> &Arc<SchemaMigration<Value>> {
        &self.migrations
    }

    fn stamp(&self, value: &T) -> Result<VersionedDocument> {
        Ok(VersionedDocument {
            schema_version: self.current.clone(),
            data: serde_json::to_value(value)?,
        })
    }

    fn upgrade(&self, document: VersionedDocument) -> Result<T> {
        let VersionedDocument {
            schema_version: stored,
            data,
        } = document;

        let data = if stored == self.current {
            data
        } else if stored > self.current {
            return Err(SerializationError::NewerSchema {
                found: stored,
                supported: self.current.clone(),
            });
        } else if self.migrations.can_migrate(&stored, &self.current) {
            debug!(from = %stored, to = %self.current, "Migrating stored document");
            self.migrations.migrate(data, &stored, &self.current)?
        } else if self.current.is_compatible_with(&stored) {
            debug!(
                from = %stored,
                to = %self.current,
                "No migration path, reading compatible document as-is"
            );
            data
        } else {
            return Err(MigrationError::NoPath {
                from: stored,
                to: self.current.clone(),
            }
            .into());
        };

        Ok(serde_json::from_value(data)?)
    }

    fn encode_binary(&self, value: &T) -> Result<Vec<u8>> {
        let document = self.stamp(value)?;
        let payload = serde_json::to_vec(&document.data)?;

        let mut buffer = BinaryBuffer::new();
        buffer.write_string(&document.schema_version.to_string())?;
        buffer.write_bytes(&payload)?;
        Ok(buffer.into_bytes())
    }

    fn decode_binary(&self, bytes: &[u8]) -> Result<T> {
        let mut buffer = BinaryBuffer::wrap(bytes);
        let version = buffer.read_string()?;
        let payload = buffer.read_bytes()?;
        if buffer.has_remaining() {
            return Err(SerializationError::TrailingBytes {
                remaining: buffer.remaining(),
            });
        }

        let schema_version = SchemaVersion::parse(&version).map_err(|e| {
            SerializationError::malformed(format!("invalid stored schema version: {e}"))
        })?;
        let data = serde_json::from_slice(&payload)?;
        self.upgrade(VersionedDocument {
            schema_version,
            data,
        })
    }
}

impl<T> Serializer<T> for VersionedSerializer<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn serialize(&self, value: &T, context: &SerializationContext) -> Result<String> {
        match context.format() {
            Format::Json => {
                let document = self.stamp(value)?;
                let text = if context.pretty_print() {
                    serde_json::to_string_pretty(&document)?
                } else {
                    serde_json::to_string(&document)?
                };
                Ok(text)
            }
            Format::Base64 => {
                let document = self.stamp(value)?;
                Ok(encode_base64(&serde_json::to_vec(&document)?))
            }
            Format::Binary => Ok(encode_base64(&self.encode_binary(value)?)),
        }
    }

    fn deserialize(&self, data: &str, context: &SerializationContext) -> Result<T> {
        match context.format() {
            Format::Json => {
                let text = if context.lenient_parsing() {
                    data.trim_start_matches('\u{feff}').trim()
                } else {
                    data
                };
                self.upgrade(serde_json::from_str(text)?)
            }
            Format::Base64 => {
                let bytes = decode_base64(data, context)?;
                self.upgrade(serde_json::from_slice(&bytes)?)
            }
            Format::Binary => {
                let bytes = decode_base64(data, context)?;
                self.decode_binary(&bytes)
            }
        }
    }

    fn target_type(&self) -> TargetType {
        TargetType::of::<T>()
    }

    fn supports(&self, _format: Format) -> bool {
        true
    }

    fn to_bytes(&self, value: &T, context: &SerializationContext) -> Result<Vec<u8>> {
        match context.format() {
            Format::Binary => self.encode_binary(value),
            _ => {
                let text = self.serialize(value, context)?;
                context.charset().encode(&text)
            }
        }
    }

    fn from_bytes(&self, bytes: &[u8], context: &SerializationContext) -> Result<T> {
        match context.format() {
            Format::Binary => self.decode_binary(bytes),
            _ => {
                let text = context.charset().decode(bytes)?;
                self.deserialize(&text, context)
            }
        }
    }
}

impl<T> fmt::Debug for VersionedSerializer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedSerializer")
            .field("target", &std::any::type_name::<T>())
            .field("current", &self.current)
            .field("migrations", &self.migrations.step_count())
            .finish()
    }
}
