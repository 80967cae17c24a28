use crate::{
    core::types::{FieldElement, PartialHashState},
    dkim::fetch::KeyEntry,
    error::Result,
};

/// Hashing primitive that can stop after a whole number of SHA-256 blocks.
pub trait PartialHasher {
    /// Absorbs `prefix`, whose length must be a multiple of 64.
    fn partial_state(&self, prefix: &[u8]) -> Result<PartialHashState>;
}

/// Hash of a public key's limb decomposition, as stored in the key registry.
pub trait KeyHasher: Send + Sync {
    fn hash_limbs(&self, limbs: &[u128]) -> FieldElement;
}

/// Where published DKIM key records for a domain come from.
pub trait KeySource: Send + Sync {
    fn fetch(&self, domain: &str) -> Result<Vec<KeyEntry>>;
}
