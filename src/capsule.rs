//! Fixed-size transmission units for body content that does not fit a call.
//!
//! Chunks are zero padded to a common size and handed out last chunk first,
//! the order a stack-based consumer pops them in.

use serde::{Deserialize, Serialize};

use crate::{
    core::FieldElement,
    error::{ExtractError, Result},
    hash::sha256::BLOCK_SIZE,
};

/// One zero-padded chunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capsule(pub Vec<u8>);

impl Capsule {
    /// One field element per byte.
    pub fn to_fields(&self) -> Vec<FieldElement> {
        self.0
            .iter()
            .map(|byte| {
                let mut element = FieldElement::ZERO;
                element.0[31] = *byte;
                element
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Capsules for one byte sequence, in delivery order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleSet {
    pub chunk_size: usize,
    pub original_len: usize,
    pub capsules: Vec<Capsule>,
}

impl CapsuleSet {
    /// Splits `bytes` into `chunk_size` chunks, padding the last and
    /// reversing the order.
    pub fn chunk(bytes: &[u8], chunk_size: usize) -> Result<Self> {
        if chunk_size < BLOCK_SIZE {
            return Err(ExtractError::Invariant(format!(
                "capsule chunk size {} is below {} bytes",
                chunk_size, BLOCK_SIZE
            )));
        }
        let mut capsules: Vec<Capsule> = bytes
            .chunks(chunk_size)
            .map(|chunk| {
                let mut padded = chunk.to_vec();
                padded.resize(chunk_size, 0);
                Capsule(padded)
            })
            .collect();
        capsules.reverse();
        Ok(Self {
            chunk_size,
            original_len: bytes.len(),
            capsules,
        })
    }

    pub fn len(&self) -> usize {
        self.capsules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capsules.is_empty()
    }

    /// Restores the bytes the set was built from.
    pub fn reassemble(&self) -> Result<Vec<u8>> {
        let mut bytes: Vec<u8> = self
            .capsules
            .iter()
            .rev()
            .flat_map(|capsule| capsule.0.iter().copied())
            .collect();
        if bytes.len() < self.original_len {
            return Err(ExtractError::Invariant(format!(
                "capsules hold {} bytes, expected at least {}",
                bytes.len(),
                self.original_len
            )));
        }
        bytes.truncate(self.original_len);
        Ok(bytes)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ExtractError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (set, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| ExtractError::Serialization(e.to_string()))?;
        Ok(set)
    }
}
