use std::fmt;

use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    error::{ExtractError, Result},
    hash::sha256::{self, BLOCK_SIZE},
};

/// Contiguous byte range inside a header or body buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceSpan {
    pub index: usize,
    pub length: usize,
}

impl SequenceSpan {
    /// Builds a span, checking that it lies inside a buffer of `buffer_len` bytes.
    pub fn within(index: usize, length: usize, buffer_len: usize) -> Result<Self> {
        match index.checked_add(length) {
            Some(end) if end <= buffer_len => Ok(Self { index, length }),
            _ => Err(ExtractError::Invariant(format!(
                "span {}+{} exceeds buffer of {} bytes",
                index, length, buffer_len
            ))),
        }
    }

    /// Builds a span from a half-open `[start, end)` range.
    pub fn from_range(start: usize, end: usize, buffer_len: usize) -> Result<Self> {
        let length = end.checked_sub(start).ok_or_else(|| {
            ExtractError::Invariant(format!("span end {} precedes start {}", end, start))
        })?;
        Self::within(start, length, buffer_len)
    }

    pub fn end(&self) -> usize {
        self.index + self.length
    }

    pub fn slice<'a>(&self, buffer: &'a [u8]) -> &'a [u8] {
        &buffer[self.index .. self.end()]
    }
}

/// A span together with the 64-byte aligned window that covers it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashAlignedSpan {
    /// Span in the coordinates of the full body
    pub span: SequenceSpan,
    pub slice_start: usize,
    pub slice_end: usize,
}

impl HashAlignedSpan {
    pub fn new(span: SequenceSpan, slice_start: usize, slice_end: usize) -> Result<Self> {
        if slice_start % BLOCK_SIZE != 0 || slice_end % BLOCK_SIZE != 0 {
            return Err(ExtractError::Invariant(format!(
                "window [{}, {}) is not block aligned",
                slice_start, slice_end
            )));
        }
        if slice_start > span.index || slice_end < span.end() {
            return Err(ExtractError::Invariant(format!(
                "window [{}, {}) does not cover span {}+{}",
                slice_start, slice_end, span.index, span.length
            )));
        }
        Ok(Self {
            span,
            slice_start,
            slice_end,
        })
    }

    /// Span offsets local to the window.
    pub fn local(&self) -> SequenceSpan {
        SequenceSpan {
            index: self.span.index - self.slice_start,
            length: self.span.length,
        }
    }
}

/// SHA-256 chaining state after absorbing whole blocks of a buffer prefix.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialHashState {
    pub state: [u32; 8],
    /// Number of bytes absorbed, always a multiple of the block size
    pub absorbed: usize,
}

impl PartialHashState {
    /// State before any block has been absorbed.
    pub fn identity() -> Self {
        Self {
            state: sha256::IV,
            absorbed: 0,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.absorbed == 0
    }

    /// Finishes the hash over the bytes that follow the absorbed prefix.
    pub fn finish(&self, rest: &[u8]) -> [u8; 32] {
        sha256::finish(self.state, self.absorbed, rest)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(sha256::state_to_bytes(&self.state))
    }
}

/// Fixed-capacity byte vector with an explicit logical length, zero padded.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedBytes {
    pub storage: Vec<u8>,
    pub len: usize,
}

impl BoundedBytes {
    /// Returns `None` when `bytes` does not fit in `max` bytes.
    pub fn fit(bytes: &[u8], max: usize) -> Option<Self> {
        if bytes.len() > max {
            return None;
        }
        let mut storage = vec![0u8; max];
        storage[.. bytes.len()].copy_from_slice(bytes);
        Some(Self {
            storage,
            len: bytes.len(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.storage[.. self.len]
    }
}

/// A 32-byte big-endian value below the BN254 scalar field modulus.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldElement(pub [u8; 32]);

impl FieldElement {
    pub const ZERO: Self = Self([0u8; 32]);

    /// BN254 scalar field modulus, big-endian.
    pub const MODULUS: [u8; 32] = [
        0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58,
        0x5d, 0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00,
        0x00, 0x01,
    ];

    /// Truncates a 256-bit digest to 248 bits by clearing the top byte.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        let mut bytes = digest;
        bytes[0] = 0;
        Self(bytes)
    }

    pub fn from_biguint(value: &BigUint) -> Result<Self> {
        let raw = value.to_bytes_be();
        if raw.len() > 32 {
            return Err(ExtractError::KeyParse(format!(
                "value of {} bits does not fit a field element",
                value.bits()
            )));
        }
        let mut bytes = [0u8; 32];
        bytes[32 - raw.len() ..].copy_from_slice(&raw);
        // big-endian arrays compare numerically
        if bytes >= Self::MODULUS {
            return Err(ExtractError::KeyParse(format!(
                "0x{} is not below the field modulus",
                hex::encode(bytes)
            )));
        }
        Ok(Self(bytes))
    }

    /// Parses `0x`-prefixed hex or a decimal string.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(digits) => BigUint::parse_bytes(digits.as_bytes(), 16),
            None => BigUint::parse_bytes(text.as_bytes(), 10),
        }
        .ok_or_else(|| ExtractError::KeyParse(format!("invalid field element `{}`", text)))?;
        Self::from_biguint(&value)
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(serde::de::Error::custom)
    }
}
