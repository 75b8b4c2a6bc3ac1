//! # Serialization Context
//!
//! Every codec call receives a [`SerializationContext`] describing the wire
//! format, compression, schema version, charset and formatting flags to use.
//! There is no ambient or global configuration: whatever a codec needs to know
//! arrives through this value.
//!
//! Contexts are immutable. Build one with [`SerializationContext::builder`]
//! and derive variants with the `with_*` methods, which return new instances.

use crate::buffer::WireTag;
use crate::error::{Result, SerializationError};
use playersync_schema::SchemaVersion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Case-insensitive name parsing for the context enums, plus the string
/// conversions serde goes through.
macro_rules! name_parsing {
    ($ty:ident, $kind:literal, [$(($name:literal, $value:expr)),+ $(,)?]) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(input: &str) -> std::result::Result<Self, Self::Err> {
                let input = input.trim();
                $(
                    if input.eq_ignore_ascii_case($name) {
                        return Ok($value);
                    }
                )+
                Err(format!("unknown {} '{}'", $kind, input))
            }
        }

        impl TryFrom<String> for $ty {
            type Error = String;

            fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$ty> for &'static str {
            fn from(value: $ty) -> Self {
                value.name()
            }
        }
    };
}

/// Wire format a codec should produce or consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Format {
    /// JSON text
    #[default]
    Json,
    /// Base64 text wrapping the codec's compact representation
    Base64,
    /// Raw bytes in the codec's native binary layout
    Binary,
}

impl Format {
    pub fn name(&self) -> &'static str {
        match self {
            Format::Json => "JSON",
            Format::Base64 => "BASE64",
            Format::Binary => "BINARY",
        }
    }
}

name_parsing!(Format, "format", [
    ("JSON", Format::Json),
    ("BASE64", Format::Base64),
    ("BINARY", Format::Binary),
]);

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl WireTag for Format {
    const TYPE_NAME: &'static str = "Format";

    fn wire_tag(&self) -> u32 {
        match self {
            Format::Json => 0,
            Format::Base64 => 1,
            Format::Binary => 2,
        }
    }

    fn from_wire_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Format::Json),
            1 => Some(Format::Base64),
            2 => Some(Format::Binary),
            _ => None,
        }
    }
}

/// Compression algorithm for binary payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum CompressionType {
    /// No compression
    #[default]
    None,
    /// GZIP - self-identifying via its `0x1F 0x8B` magic
    Gzip,
    /// Fast-mode raw deflate, used where LZ4 would be on other platforms
    Fast,
}

impl CompressionType {
    pub fn name(&self) -> &'static str {
        match self {
            CompressionType::None => "NONE",
            CompressionType::Gzip => "GZIP",
            CompressionType::Fast => "FAST",
        }
    }
}

name_parsing!(CompressionType, "compression type", [
    ("NONE", CompressionType::None),
    ("GZIP", CompressionType::Gzip),
    ("FAST", CompressionType::Fast),
    ("LZ4", CompressionType::Fast),
]);

impl fmt::Display for CompressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl WireTag for CompressionType {
    const TYPE_NAME: &'static str = "CompressionType";

    fn wire_tag(&self) -> u32 {
        match self {
            CompressionType::None => 0,
            CompressionType::Gzip => 1,
            CompressionType::Fast => 2,
        }
    }

    fn from_wire_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Gzip),
            2 => Some(CompressionType::Fast),
            _ => None,
        }
    }
}

/// Character set used to turn a codec's string form into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Charset {
    #[default]
    Utf8,
    Latin1,
    Ascii,
}

impl Charset {
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "ISO-8859-1",
            Charset::Ascii => "US-ASCII",
        }
    }

    /// Encodes text, failing on characters the charset cannot represent.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        match self {
            Charset::Utf8 => Ok(text.as_bytes().to_vec()),
            Charset::Latin1 => text
                .chars()
                .map(|c| u8::try_from(c).map_err(|_| self.unmappable(c)))
                .collect(),
            Charset::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { Ok(c as u8) } else { Err(self.unmappable(c)) })
                .collect(),
        }
    }

    /// Decodes bytes, failing on sequences invalid in the charset.
    pub fn decode(&self, bytes: &[u8]) -> Result<String> {
        match self {
            Charset::Utf8 => Ok(String::from_utf8(bytes.to_vec())?),
            Charset::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
            Charset::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                None => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
                Some(index) => Err(SerializationError::Charset {
                    charset: self.name(),
                    reason: format!("byte 0x{:02X} at offset {index} is not ASCII", bytes[index]),
                }),
            },
        }
    }

    fn unmappable(&self, c: char) -> SerializationError {
        SerializationError::Charset {
            charset: self.name(),
            reason: format!("character {c:?} (U+{:04X}) is unmappable", u32::from(c)),
        }
    }
}

name_parsing!(Charset, "charset", [
    ("UTF-8", Charset::Utf8),
    ("UTF8", Charset::Utf8),
    ("ISO-8859-1", Charset::Latin1),
    ("LATIN1", Charset::Latin1),
    ("US-ASCII", Charset::Ascii),
    ("ASCII", Charset::Ascii),
]);

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable settings passed to every codec call.
///
/// # Examples
///
/// ```rust
/// use playersync_codec::{CompressionType, Format, SerializationContext};
/// use playersync_schema::SchemaVersion;
///
/// let context = SerializationContext::builder()
///     .format(Format::Binary)
///     .compression(CompressionType::Gzip)
///     .schema_version(SchemaVersion::of(2, 1, 0))
///     .property("origin", "lobby-1")
///     .build();
///
/// assert!(context.is_compressed());
///
/// let as_json = context.with_format(Format::Json);
/// assert_eq!(as_json.format(), Format::Json);
/// assert_eq!(context.format(), Format::Binary);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerializationContext {
    format: Format,
    compression: CompressionType,
    schema_version: SchemaVersion,
    charset: Charset,
    pretty_print: bool,
    include_nulls: bool,
    preserve_order: bool,
    lenient_parsing: bool,
    properties: BTreeMap<String, String>,
}

impl SerializationContext {
    pub fn builder() -> SerializationContextBuilder {
        SerializationContextBuilder::default()
    }

    /// Default context producing JSON.
    pub fn json() -> Self {
        Self::default()
    }

    /// Default context producing Base64 text.
    pub fn base64() -> Self {
        Self::builder().format(Format::Base64).build()
    }

    /// Default context producing native binary.
    pub fn binary() -> Self {
        Self::builder().format(Format::Binary).build()
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn compression(&self) -> CompressionType {
        self.compression
    }

    pub fn schema_version(&self) -> &SchemaVersion {
        &self.schema_version
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn pretty_print(&self) -> bool {
        self.pretty_print
    }

    /// Whether null object members are written. Turning this off is lossy
    /// for maps and `serde_json::Value` documents, whose null members do not
    /// come back on read.
    pub fn include_nulls(&self) -> bool {
        self.include_nulls
    }

    pub fn preserve_order(&self) -> bool {
        self.preserve_order
    }

    pub fn lenient_parsing(&self) -> bool {
        self.lenient_parsing
    }

    pub fn is_compressed(&self) -> bool {
        self.compression != CompressionType::None
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    pub fn with_format(&self, format: Format) -> Self {
        Self {
            format,
            ..self.clone()
        }
    }

    pub fn with_compression(&self, compression: CompressionType) -> Self {
        Self {
            compression,
            ..self.clone()
        }
    }

    pub fn with_schema_version(&self, schema_version: SchemaVersion) -> Self {
        Self {
            schema_version,
            ..self.clone()
        }
    }

    pub fn with_charset(&self, charset: Charset) -> Self {
        Self {
            charset,
            ..self.clone()
        }
    }

    pub fn with_pretty_print(&self, pretty_print: bool) -> Self {
        Self {
            pretty_print,
            ..self.clone()
        }
    }

    pub fn with_include_nulls(&self, include_nulls: bool) -> Self {
        Self {
            include_nulls,
            ..self.clone()
        }
    }

    pub fn with_preserve_order(&self, preserve_order: bool) -> Self {
        Self {
            preserve_order,
            ..self.clone()
        }
    }

    pub fn with_lenient_parsing(&self, lenient_parsing: bool) -> Self {
        Self {
            lenient_parsing,
            ..self.clone()
        }
    }

    pub fn with_property(&self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.properties.insert(key.into(), value.into());
        next
    }
}

impl Default for SerializationContext {
    fn default() -> Self {
        SerializationContextBuilder::default().build()
    }
}

/// Builder for [`SerializationContext`]. Every field has a default.
#[derive(Debug, Clone)]
pub struct SerializationContextBuilder {
    format: Format,
    compression: CompressionType,
    schema_version: SchemaVersion,
    charset: Charset,
    pretty_print: bool,
    include_nulls: bool,
    preserve_order: bool,
    lenient_parsing: bool,
    properties: BTreeMap<String, String>,
}

impl Default for SerializationContextBuilder {
    fn default() -> Self {
        Self {
            format: Format::Json,
            compression: CompressionType::None,
            schema_version: SchemaVersion::current(),
            charset: Charset::Utf8,
            pretty_print: false,
            include_nulls: true,
            preserve_order: true,
            lenient_parsing: false,
            properties: BTreeMap::new(),
        }
    }
}

impl SerializationContextBuilder {
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    pub fn compression(mut self, compression: CompressionType) -> Self {
        self.compression = compression;
        self
    }

    pub fn schema_version(mut self, schema_version: SchemaVersion) -> Self {
        self.schema_version = schema_version;
        self
    }

    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    pub fn pretty_print(mut self, pretty_print: bool) -> Self {
        self.pretty_print = pretty_print;
        self
    }

    pub fn include_nulls(mut self, include_nulls: bool) -> Self {
        self.include_nulls = include_nulls;
        self
    }

    pub fn preserve_order(mut self, preserve_order: bool) -> Self {
        self.preserve_order = preserve_order;
        self
    }

    pub fn lenient_parsing(mut self, lenient_parsing: bool) -> Self {
        self.lenient_parsing = lenient_parsing;
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> SerializationContext {
        SerializationContext {
            format: self.format,
            compression: self.compression,
            schema_version: self.schema_version,
            charset: self.charset,
            pretty_print: self.pretty_print,
            include_nulls: self.include_nulls,
            preserve_order: self.preserve_order,
            lenient_parsing: self.lenient_parsing,
            properties: self.properties,
        }
    }
}
