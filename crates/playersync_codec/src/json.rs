//! JSON codec for any serde type.

use crate::context::{Format, SerializationContext};
use crate::error::{Result, SerializationError};
use crate::serializer::{decode_base64, encode_base64, Serializer, TargetType};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::marker::PhantomData;

/// Serializer for types implementing serde's `Serialize` and `Deserialize`.
///
/// Supports [`Format::Json`] and [`Format::Base64`] (Base64 over the compact
/// JSON bytes). Output honours the context's `pretty_print`, `include_nulls`
/// and `preserve_order` flags; `lenient_parsing` tolerates a leading byte
/// order mark, surrounding whitespace and unpadded Base64.
pub struct JsonSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSerializer<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonSerializer<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonSerializer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JsonSerializer<{}>", std::any::type_name::<T>())
    }
}

impl<T> JsonSerializer<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn encode(&self, value: &T, context: &SerializationContext, pretty: bool) -> Result<String> {
        let mut tree = serde_json::to_value(value)?;
        normalize(&mut tree, context.include_nulls(), context.preserve_order());
        let text = if pretty {
            serde_json::to_string_pretty(&tree)?
        } else {
            serde_json::to_string(&tree)?
        };
        Ok(text)
    }

    fn decode(&self, text: &str, context: &SerializationContext) -> Result<T> {
        let text = if context.lenient_parsing() {
            text.trim_start_matches('\u{feff}').trim()
        } else {
            text
        };
        Ok(serde_json::from_str(text)?)
    }

    fn unsupported(&self, format: Format) -> SerializationError {
        SerializationError::UnsupportedFormat {
            type_name: std::any::type_name::<T>(),
            format,
        }
    }
}

impl<T> Serializer<T> for JsonSerializer<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn serialize(&self, value: &T, context: &SerializationContext) -> Result<String> {
        match context.format() {
            Format::Json => self.encode(value, context, context.pretty_print()),
            Format::Base64 => {
                let compact = self.encode(value, context, false)?;
                Ok(encode_base64(compact.as_bytes()))
            }
            format => Err(self.unsupported(format)),
        }
    }

    fn deserialize(&self, data: &str, context: &SerializationContext) -> Result<T> {
        match context.format() {
            Format::Json => self.decode(data, context),
            Format::Base64 => {
                let bytes = decode_base64(data, context)?;
                let text = String::from_utf8(bytes)?;
                self.decode(&text, context)
            }
            format => Err(self.unsupported(format)),
        }
    }

    fn target_type(&self) -> TargetType {
        TargetType::of::<T>()
    }

    fn supports(&self, format: Format) -> bool {
        matches!(format, Format::Json | Format::Base64)
    }
}

/// Drops null object members and sorts keys, recursively, as requested.
fn normalize(value: &mut Value, include_nulls: bool, preserve_order: bool) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = std::mem::take(map)
                .into_iter()
                .filter(|(_, member)| include_nulls || !member.is_null())
                .collect();
            if !preserve_order {
                entries.sort_by(|a, b| a.0.cmp(&b.0));
            }
            for (_, member) in entries.iter_mut() {
                normalize(member, include_nulls, preserve_order);
            }
            *map = entries.into_iter().collect::<Map<String, Value>>();
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                normalize(item, include_nulls, preserve_order);
            }
        }
        _ => {}
    }
}
