//! Natively binary codecs built on [`BinaryBuffer`].

use crate::buffer::BinaryBuffer;
use crate::context::{Format, SerializationContext};
use crate::error::{Result, SerializationError};
use crate::serializer::{decode_base64, encode_base64, Serializer, TargetType};
use std::fmt;
use std::marker::PhantomData;

/// Field-level layout of a value in a [`BinaryBuffer`].
///
/// Implementations write fields in a fixed order and read them back in the
/// same order. Use [`crate::buffer::WireTag`] for enums so the layout does not
/// depend on variant declaration order.
pub trait BinaryCodec<T>: Send + Sync {
    fn write(&self, value: &T, buffer: &mut BinaryBuffer) -> Result<()>;

    fn read(&self, buffer: &mut BinaryBuffer) -> Result<T>;
}

/// Serializer whose native form is the bytes produced by a [`BinaryCodec`].
///
/// [`Format::Binary`] and [`Format::Base64`] both use Base64 text as the
/// string form; [`Format::Json`] is unsupported. Decoding fails with
/// [`SerializationError::TrailingBytes`] if the codec leaves input unread.
pub struct BinarySerializer<T, C> {
    codec: C,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C> BinarySerializer<T, C>
where
    T: 'static,
    C: BinaryCodec<T>,
{
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            _marker: PhantomData,
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    fn check_format(&self, format: Format) -> Result<()> {
        match format {
            Format::Binary | Format::Base64 => Ok(()),
            Format::Json => Err(SerializationError::UnsupportedFormat {
                type_name: std::any::type_name::<T>(),
                format,
            }),
        }
    }
}

impl<T, C> Serializer<T> for BinarySerializer<T, C>
where
    T: 'static,
    C: BinaryCodec<T>,
{
    fn serialize(&self, value: &T, context: &SerializationContext) -> Result<String> {
        let bytes = self.to_bytes(value, context)?;
        Ok(encode_base64(&bytes))
    }

    fn deserialize(&self, data: &str, context: &SerializationContext) -> Result<T> {
        self.check_format(context.format())?;
        let bytes = decode_base64(data, context)?;
        self.from_bytes(&bytes, context)
    }

    fn target_type(&self) -> TargetType {
        TargetType::of::<T>()
    }

    fn supports(&self, format: Format) -> bool {
        self.check_format(format).is_ok()
    }

    fn to_bytes(&self, value: &T, context: &SerializationContext) -> Result<Vec<u8>> {
        self.check_format(context.format())?;
        let mut buffer = BinaryBuffer::new();
        self.codec.write(value, &mut buffer)?;
        Ok(buffer.into_bytes())
    }

    fn from_bytes(&self, bytes: &[u8], context: &SerializationContext) -> Result<T> {
        self.check_format(context.format())?;
        let mut buffer = BinaryBuffer::wrap(bytes);
        let value = self.codec.read(&mut buffer)?;
        if buffer.has_remaining() {
            return Err(SerializationError::TrailingBytes {
                remaining: buffer.remaining(),
            });
        }
        Ok(value)
    }
}

impl<T, C: fmt::Debug> fmt::Debug for BinarySerializer<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BinarySerializer")
            .field("target", &std::any::type_name::<T>())
            .field("codec", &self.codec)
            .finish()
    }
}
