use std::sync::atomic::{AtomicUsize, Ordering};

use super::Sha256Backend;
use crate::{
    core::{FieldElement, KeyHasher, PartialHashState, PartialHasher},
    error::Result,
};

/// Backend wrapper that counts how often each primitive is invoked.
///
/// Lets callers check that work was skipped, e.g. no partial hash is
/// requested for a window that starts at offset zero.
pub struct CountingBackend {
    inner: Sha256Backend,
    partial_calls: AtomicUsize,
    key_calls: AtomicUsize,
}

impl CountingBackend {
    pub fn new() -> Result<Self> {
        Ok(Self {
            inner: Sha256Backend::initialize()?,
            partial_calls: AtomicUsize::new(0),
            key_calls: AtomicUsize::new(0),
        })
    }

    pub fn partial_calls(&self) -> usize {
        self.partial_calls.load(Ordering::SeqCst)
    }

    pub fn key_calls(&self) -> usize {
        self.key_calls.load(Ordering::SeqCst)
    }
}

impl PartialHasher for CountingBackend {
    fn partial_state(&self, prefix: &[u8]) -> Result<PartialHashState> {
        self.partial_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.partial_state(prefix)
    }
}

impl KeyHasher for CountingBackend {
    fn hash_limbs(&self, limbs: &[u128]) -> FieldElement {
        self.key_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.hash_limbs(limbs)
    }
}
