pub mod mock;
pub mod sha256_backend;

use std::sync::{Arc, OnceLock};

use tracing::debug;

pub use sha256_backend::Sha256Backend;

use crate::error::{ExtractError, Result};

static BACKEND: OnceLock<Arc<Sha256Backend>> = OnceLock::new();

/// Returns the shared crypto backend, initializing it on first use.
///
/// Safe to call any number of times from any thread: a backend that is
/// already initialized is returned as is, and a racing initialization simply
/// loses to the first one stored.
pub fn acquire() -> Result<Arc<Sha256Backend>> {
    if let Some(backend) = BACKEND.get() {
        return Ok(Arc::clone(backend));
    }
    let fresh = Arc::new(Sha256Backend::initialize()?);
    if BACKEND.set(fresh).is_ok() {
        debug!("crypto backend initialized");
    }
    BACKEND
        .get()
        .cloned()
        .ok_or_else(|| ExtractError::Backend("backend missing after initialization".to_string()))
}
