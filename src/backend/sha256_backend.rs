use crate::{
    core::{FieldElement, KeyHasher, PartialHashState, PartialHasher},
    error::{ExtractError, Result},
    hash::sha256::{self, BLOCK_SIZE},
};

/// SHA-256 backed implementation of the hashing primitives.
#[derive(Debug)]
pub struct Sha256Backend {
    _private: (),
}

impl Sha256Backend {
    /// Builds the backend after a known-answer self test of the block compressor.
    pub fn initialize() -> Result<Self> {
        let expected = sha256::hash(b"abc");
        if sha256::finish(sha256::IV, 0, b"abc") != expected {
            return Err(ExtractError::Backend(
                "SHA-256 compression self test failed".to_string(),
            ));
        }
        Ok(Self { _private: () })
    }
}

impl PartialHasher for Sha256Backend {
    fn partial_state(&self, prefix: &[u8]) -> Result<PartialHashState> {
        if prefix.len() % BLOCK_SIZE != 0 {
            return Err(ExtractError::Invariant(format!(
                "partial hash prefix of {} bytes is not block aligned",
                prefix.len()
            )));
        }
        let mut state = sha256::IV;
        sha256::compress_blocks(&mut state, prefix);
        Ok(PartialHashState {
            state,
            absorbed: prefix.len(),
        })
    }
}

impl KeyHasher for Sha256Backend {
    fn hash_limbs(&self, limbs: &[u128]) -> FieldElement {
        let mut preimage = Vec::with_capacity(limbs.len() * 16);
        for limb in limbs {
            preimage.extend_from_slice(&limb.to_be_bytes());
        }
        FieldElement::from_digest(sha256::hash(&preimage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_state_resumes_to_full_digest() {
        let backend = Sha256Backend::initialize().unwrap();
        let data = vec![b'x'; 200];
        let partial = backend.partial_state(&data[.. 128]).unwrap();
        assert_eq!(partial.absorbed, 128);
        assert_eq!(partial.finish(&data[128 ..]), sha256::hash(&data));
    }

    #[test]
    fn test_partial_state_rejects_unaligned_prefix() {
        let backend = Sha256Backend::initialize().unwrap();
        assert!(matches!(
            backend.partial_state(&[0u8; 65]),
            Err(ExtractError::Invariant(_))
        ));
    }

    #[test]
    fn test_key_hash_is_deterministic() {
        let backend = Sha256Backend::initialize().unwrap();
        let a = backend.hash_limbs(&[1, 2, 3]);
        assert_eq!(a, backend.hash_limbs(&[1, 2, 3]));
        assert_ne!(a, backend.hash_limbs(&[1, 2, 4]));
        assert_eq!(a.0[0], 0);
    }
}
