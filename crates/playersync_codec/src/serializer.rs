//! # Serializer Contract
//!
//! [`Serializer`] is the polymorphic interface every codec implements. A codec
//! owns a primary string form (`serialize`/`deserialize`) and gets the byte,
//! JSON and Base64 helpers for free; natively binary codecs override
//! [`Serializer::to_bytes`] and [`Serializer::from_bytes`] instead of going
//! through text.

use crate::context::{Format, SerializationContext};
use crate::error::{Result, SerializationError};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Runtime identity of the value type a serializer handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetType {
    id: TypeId,
    name: &'static str,
}

impl TargetType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Converts values of `T` to and from their wire forms.
///
/// Implementations must be stateless with respect to individual calls: every
/// setting they honour arrives through the [`SerializationContext`]. For every
/// format a codec supports, `deserialize(serialize(v))` and
/// `from_bytes(to_bytes(v))` must return a value equal to `v`.
///
/// Formats a codec does not implement fail with
/// [`SerializationError::UnsupportedFormat`].
pub trait Serializer<T>: Send + Sync {
    /// Encodes `value` into the string form selected by `context.format()`.
    fn serialize(&self, value: &T, context: &SerializationContext) -> Result<String>;

    /// Decodes a value from its string form.
    fn deserialize(&self, data: &str, context: &SerializationContext) -> Result<T>;

    /// The value type this serializer handles.
    fn target_type(&self) -> TargetType;

    /// Whether this serializer implements `format`.
    ///
    /// The default tries [`Serializer::deserialize`] with empty input and
    /// treats anything other than `UnsupportedFormat` as support. Codecs that
    /// know their formats statically should override it.
    fn supports(&self, format: Format) -> bool {
        let trial = SerializationContext::default().with_format(format);
        !matches!(
            self.deserialize("", &trial),
            Err(SerializationError::UnsupportedFormat { .. })
        )
    }

    /// Encodes `value` to bytes. Defaults to the string form in the
    /// context's charset.
    fn to_bytes(&self, value: &T, context: &SerializationContext) -> Result<Vec<u8>> {
        let text = self.serialize(value, context)?;
        context.charset().encode(&text)
    }

    /// Decodes a value from bytes produced by [`Serializer::to_bytes`].
    fn from_bytes(&self, bytes: &[u8], context: &SerializationContext) -> Result<T> {
        let text = context.charset().decode(bytes)?;
        self.deserialize(&text, context)
    }

    fn to_json(&self, value: &T, context: &SerializationContext) -> Result<String> {
        self.serialize(value, &context.with_format(Format::Json))
    }

    fn from_json(&self, json: &str, context: &SerializationContext) -> Result<T> {
        self.deserialize(json, &context.with_format(Format::Json))
    }

    fn to_base64(&self, value: &T, context: &SerializationContext) -> Result<String> {
        self.serialize(value, &context.with_format(Format::Base64))
    }

    fn from_base64(&self, data: &str, context: &SerializationContext) -> Result<T> {
        self.deserialize(data, &context.with_format(Format::Base64))
    }

    /// Like [`Serializer::deserialize`], but returns `None` on failure.
    fn try_deserialize(&self, data: &str, context: &SerializationContext) -> Option<T> {
        match self.deserialize(data, context) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(
                    target_type = %self.target_type(),
                    format = %context.format(),
                    error = %e,
                    "Deserialization failed"
                );
                None
            }
        }
    }

    /// Adapts this serializer into one for `R`.
    ///
    /// `into_inner` converts the outer value before encoding and `from_inner`
    /// converts the decoded value back. All formats and byte handling are
    /// delegated unchanged.
    fn map<R, I, F>(self, into_inner: I, from_inner: F) -> MappedSerializer<T, R, Self, I, F>
    where
        Self: Sized,
        R: 'static,
        I: Fn(&R) -> T + Send + Sync,
        F: Fn(T) -> R + Send + Sync,
    {
        MappedSerializer {
            inner: self,
            into_inner,
            from_inner,
            _marker: PhantomData,
        }
    }
}

impl<T, S> Serializer<T> for Arc<S>
where
    S: Serializer<T> + ?Sized,
{
    fn serialize(&self, value: &T, context: &SerializationContext) -> Result<String> {
        (**self).serialize(value, context)
    }

    fn deserialize(&self, data: &str, context: &SerializationContext) -> Result<T> {
        (**self).deserialize(data, context)
    }

    fn target_type(&self) -> TargetType {
        (**self).target_type()
    }

    fn supports(&self, format: Format) -> bool {
        (**self).supports(format)
    }

    fn to_bytes(&self, value: &T, context: &SerializationContext) -> Result<Vec<u8>> {
        (**self).to_bytes(value, context)
    }

    fn from_bytes(&self, bytes: &[u8], context: &SerializationContext) -> Result<T> {
        (**self).from_bytes(bytes, context)
    }
}

/// Serializer produced by [`Serializer::map`].
pub struct MappedSerializer<T, R, S, I, F> {
    inner: S,
    into_inner: I,
    from_inner: F,
    _marker: PhantomData<fn() -> (T, R)>,
}

impl<T, R, S, I, F> MappedSerializer<T, R, S, I, F> {
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<T, R, S, I, F> Serializer<R> for MappedSerializer<T, R, S, I, F>
where
    R: 'static,
    S: Serializer<T>,
    I: Fn(&R) -> T + Send + Sync,
    F: Fn(T) -> R + Send + Sync,
{
    fn serialize(&self, value: &R, context: &SerializationContext) -> Result<String> {
        self.inner.serialize(&(self.into_inner)(value), context)
    }

    fn deserialize(&self, data: &str, context: &SerializationContext) -> Result<R> {
        self.inner.deserialize(data, context).map(&self.from_inner)
    }

    fn target_type(&self) -> TargetType {
        TargetType::of::<R>()
    }

    fn supports(&self, format: Format) -> bool {
        self.inner.supports(format)
    }

    fn to_bytes(&self, value: &R, context: &SerializationContext) -> Result<Vec<u8>> {
        self.inner.to_bytes(&(self.into_inner)(value), context)
    }

    fn from_bytes(&self, bytes: &[u8], context: &SerializationContext) -> Result<R> {
        self.inner.from_bytes(bytes, context).map(&self.from_inner)
    }
}

impl<T, R, S: fmt::Debug, I, F> fmt::Debug for MappedSerializer<T, R, S, I, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedSerializer")
            .field("inner", &self.inner)
            .field("target", &std::any::type_name::<R>())
            .finish()
    }
}

// ============================================================================
// Base64 helpers shared by the codecs
// ============================================================================

const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub(crate) fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decodes standard-alphabet Base64. Lenient contexts also accept missing
/// padding and embedded whitespace.
pub(crate) fn decode_base64(data: &str, context: &SerializationContext) -> Result<Vec<u8>> {
    if context.lenient_parsing() {
        let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
        Ok(LENIENT_BASE64.decode(compact)?)
    } else {
        Ok(STANDARD.decode(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Upper-cases on the way out, lower-cases on the way in. JSON only.
    struct ShoutingSerializer;

    impl Serializer<String> for ShoutingSerializer {
        fn serialize(&self, value: &String, context: &SerializationContext) -> Result<String> {
            match context.format() {
                Format::Json => Ok(serde_json::to_string(&value.to_uppercase())?),
                format => Err(SerializationError::UnsupportedFormat {
                    type_name: self.target_type().name(),
                    format,
                }),
            }
        }

        fn deserialize(&self, data: &str, context: &SerializationContext) -> Result<String> {
            match context.format() {
                Format::Json => {
                    let text: String = serde_json::from_str(data)?;
                    Ok(text.to_lowercase())
                }
                format => Err(SerializationError::UnsupportedFormat {
                    type_name: self.target_type().name(),
                    format,
                }),
            }
        }

        fn target_type(&self) -> TargetType {
            TargetType::of::<String>()
        }
    }

    #[derive(Debug, PartialEq)]
    struct DisplayName(String);

    #[test]
    fn test_default_supports_tries_deserialize() {
        assert!(ShoutingSerializer.supports(Format::Json));
        assert!(!ShoutingSerializer.supports(Format::Base64));
        assert!(!ShoutingSerializer.supports(Format::Binary));
    }

    #[test]
    fn test_default_bytes_use_context_charset() {
        let context = SerializationContext::json();
        let bytes = ShoutingSerializer.to_bytes(&"notch".to_string(), &context).unwrap();
        assert_eq!(bytes, b"\"NOTCH\"".to_vec());
        assert_eq!(ShoutingSerializer.from_bytes(&bytes, &context).unwrap(), "notch");

        let ascii = context.with_charset(crate::context::Charset::Ascii);
        assert!(matches!(
            ShoutingSerializer.to_bytes(&"ñ".to_string(), &ascii),
            Err(SerializationError::Charset { .. })
        ));
    }

    #[test]
    fn test_format_helpers_override_context_format() {
        let binary = SerializationContext::binary();
        let json = ShoutingSerializer.to_json(&"dinnerbone".to_string(), &binary).unwrap();
        assert_eq!(json, "\"DINNERBONE\"");
        assert_eq!(ShoutingSerializer.from_json(&json, &binary).unwrap(), "dinnerbone");
        assert!(ShoutingSerializer.to_base64(&"x".to_string(), &binary).is_err());
    }

    #[test]
    fn test_try_deserialize_swallows_errors() {
        let context = SerializationContext::json();
        assert_eq!(
            ShoutingSerializer.try_deserialize("\"JEB_\"", &context),
            Some("jeb_".to_string())
        );
        assert_eq!(ShoutingSerializer.try_deserialize("{not json", &context), None);
    }

    #[test]
    fn test_map_adapts_target_type() {
        let mapped = ShoutingSerializer.map(
            |name: &DisplayName| name.0.clone(),
            DisplayName,
        );
        let context = SerializationContext::json();

        let text = mapped.serialize(&DisplayName("Alex".into()), &context).unwrap();
        assert_eq!(text, "\"ALEX\"");
        assert_eq!(
            mapped.deserialize(&text, &context).unwrap(),
            DisplayName("alex".into())
        );
        assert_eq!(mapped.target_type(), TargetType::of::<DisplayName>());
        assert!(mapped.supports(Format::Json));
        assert!(!mapped.supports(Format::Binary));
    }

    #[test]
    fn test_arc_forwards_to_inner() {
        let shared: Arc<dyn Serializer<String>> = Arc::new(ShoutingSerializer);
        let context = SerializationContext::json();
        let text = shared.serialize(&"a".to_string(), &context).unwrap();
        assert_eq!(shared.deserialize(&text, &context).unwrap(), "a");
        assert_eq!(shared.target_type().name(), std::any::type_name::<String>());
    }

    #[test]
    fn test_lenient_base64() {
        let strict = SerializationContext::base64();
        let lenient = strict.with_lenient_parsing(true);

        assert_eq!(decode_base64("aGk=", &strict).unwrap(), b"hi".to_vec());
        assert!(decode_base64("aGk", &strict).is_err());
        assert_eq!(decode_base64("aGk", &lenient).unwrap(), b"hi".to_vec());
        assert_eq!(decode_base64(" aG\nk= ", &lenient).unwrap(), b"hi".to_vec());
        assert!(matches!(
            decode_base64("!!!!", &lenient),
            Err(SerializationError::Base64(_))
        ));
    }
}
