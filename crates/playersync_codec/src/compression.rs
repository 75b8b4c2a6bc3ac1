//! # Compression Envelope
//!
//! [`CompressedSerializer`] wraps any [`Serializer`] and frames its bytes in a
//! one-byte envelope:
//!
//! ```text
//! flag (u8) || payload
//!   0 = payload is the delegate's raw bytes
//!   1 = payload is compressed (GZIP if it starts with 1F 8B, raw deflate otherwise)
//! ```
//!
//! Small payloads and payloads that do not shrink are stored raw, so the
//! envelope never costs more than one byte over the delegate's output.

use crate::context::{CompressionType, Format, SerializationContext};
use crate::error::{Result, SerializationError};
use crate::serializer::{decode_base64, encode_base64, Serializer, TargetType};
use flate2::read::{DeflateDecoder, GzDecoder};
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;
use std::fmt;
use std::io::{Read, Write};
use std::marker::PhantomData;
use tracing::trace;

/// Payloads shorter than this are never compressed.
pub const DEFAULT_THRESHOLD: usize = 256;

/// Upper bound on decompressed output, guarding against decompression bombs.
pub const DEFAULT_MAX_DECOMPRESSED_LEN: usize = 64 * 1024 * 1024;

const FLAG_RAW: u8 = 0;
const FLAG_COMPRESSED: u8 = 1;
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Decorator adding threshold-based compression to a delegate serializer.
///
/// # Examples
///
/// ```rust
/// use playersync_codec::{CompressedSerializer, CompressionType, JsonSerializer,
///     SerializationContext, Serializer};
///
/// let serializer: CompressedSerializer<Vec<u32>, _> =
///     CompressedSerializer::new(JsonSerializer::new(), CompressionType::Gzip).with_threshold(64);
/// let context = SerializationContext::json();
///
/// let scores: Vec<u32> = vec![7; 500];
/// let bytes = serializer.to_bytes(&scores, &context)?;
/// assert_eq!(bytes[0], 1);
/// assert_eq!(serializer.from_bytes(&bytes, &context)?, scores);
/// # Ok::<(), playersync_codec::SerializationError>(())
/// ```
pub struct CompressedSerializer<T, S> {
    delegate: S,
    algorithm: CompressionType,
    threshold: usize,
    max_decompressed_len: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T, S> CompressedSerializer<T, S>
where
    S: Serializer<T>,
{
    pub fn new(delegate: S, algorithm: CompressionType) -> Self {
        Self {
            delegate,
            algorithm,
            threshold: DEFAULT_THRESHOLD,
            max_decompressed_len: DEFAULT_MAX_DECOMPRESSED_LEN,
            _marker: PhantomData,
        }
    }

    /// Uses the context's compression setting as the algorithm.
    pub fn for_context(delegate: S, context: &SerializationContext) -> Self {
        Self::new(delegate, context.compression())
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_decompressed_len(mut self, max_decompressed_len: usize) -> Self {
        self.max_decompressed_len = max_decompressed_len;
        self
    }

    pub fn delegate(&self) -> &S {
        &self.delegate
    }

    pub fn algorithm(&self) -> CompressionType {
        self.algorithm
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn max_decompressed_len(&self) -> usize {
        self.max_decompressed_len
    }

    /// Frames `raw` in an envelope, compressing it when that pays off.
    pub fn seal(&self, raw: Vec<u8>) -> Result<Vec<u8>> {
        if self.algorithm == CompressionType::None || raw.len() < self.threshold {
            trace!(
                size = raw.len(),
                threshold = self.threshold,
                algorithm = %self.algorithm,
                "Storing payload uncompressed"
            );
            return Ok(frame(FLAG_RAW, &raw));
        }

        let compressed = self.compress(&raw)?;
        if compressed.len() < raw.len() {
            trace!(
                original = raw.len(),
                compressed = compressed.len(),
                algorithm = %self.algorithm,
                "Compressed payload"
            );
            Ok(frame(FLAG_COMPRESSED, &compressed))
        } else {
            trace!(
                original = raw.len(),
                compressed = compressed.len(),
                "Compression did not shrink payload, storing raw"
            );
            Ok(frame(FLAG_RAW, &raw))
        }
    }

    /// Unwraps an envelope produced by [`CompressedSerializer::seal`].
    pub fn open(&self, envelope: &[u8]) -> Result<Vec<u8>> {
        let (&flag, payload) = envelope
            .split_first()
            .ok_or(SerializationError::TruncatedEnvelope(envelope.len()))?;

        match flag {
            FLAG_RAW => Ok(payload.to_vec()),
            FLAG_COMPRESSED => {
                if payload.starts_with(&GZIP_MAGIC) {
                    read_bounded(GzDecoder::new(payload), self.max_decompressed_len)
                } else {
                    read_bounded(DeflateDecoder::new(payload), self.max_decompressed_len)
                }
            }
            other => Err(SerializationError::InvalidEnvelopeFlag(other)),
        }
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        match self.algorithm {
            CompressionType::None => Ok(raw.to_vec()),
            CompressionType::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                encoder
                    .write_all(raw)
                    .map_err(SerializationError::Compression)?;
                encoder.finish().map_err(SerializationError::Compression)
            }
            CompressionType::Fast => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::fast());
                encoder
                    .write_all(raw)
                    .map_err(SerializationError::Compression)?;
                encoder.finish().map_err(SerializationError::Compression)
            }
        }
    }
}

impl<T, S> Serializer<T> for CompressedSerializer<T, S>
where
    S: Serializer<T>,
{
    /// Base64 text of the envelope, whatever the context's format.
    fn serialize(&self, value: &T, context: &SerializationContext) -> Result<String> {
        let envelope = self.to_bytes(value, context)?;
        Ok(encode_base64(&envelope))
    }

    fn deserialize(&self, data: &str, context: &SerializationContext) -> Result<T> {
        let envelope = decode_base64(data, context)?;
        self.from_bytes(&envelope, context)
    }

    fn target_type(&self) -> TargetType {
        self.delegate.target_type()
    }

    /// Formats the delegate accepts for the enveloped payload. The envelope's
    /// own string form is always Base64, so a `Json` context still yields
    /// Base64 text from [`serialize`](Serializer::serialize).
    fn supports(&self, format: Format) -> bool {
        self.delegate.supports(format)
    }

    fn to_bytes(&self, value: &T, context: &SerializationContext) -> Result<Vec<u8>> {
        let raw = self.delegate.to_bytes(value, context)?;
        self.seal(raw)
    }

    fn from_bytes(&self, bytes: &[u8], context: &SerializationContext) -> Result<T> {
        let payload = self.open(bytes)?;
        self.delegate.from_bytes(&payload, context)
    }
}

impl<T, S: fmt::Debug> fmt::Debug for CompressedSerializer<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressedSerializer")
            .field("delegate", &self.delegate)
            .field("algorithm", &self.algorithm)
            .field("threshold", &self.threshold)
            .field("max_decompressed_len", &self.max_decompressed_len)
            .finish()
    }
}

fn frame(flag: u8, payload: &[u8]) -> Vec<u8> {
    let mut envelope = Vec::with_capacity(payload.len() + 1);
    envelope.push(flag);
    envelope.extend_from_slice(payload);
    envelope
}

fn read_bounded<R: Read>(reader: R, max: usize) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    reader
        .take(max as u64 + 1)
        .read_to_end(&mut output)
        .map_err(SerializationError::Decompression)?;
    if output.len() > max {
        return Err(SerializationError::LengthExceeded {
            length: output.len(),
            max,
        });
    }
    Ok(output)
}
