use thiserror::Error;

use crate::providers::Provider;

/// Errors raised while turning a verified receipt email into circuit inputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// A required header field or body anchor could not be located
    #[error("{provider}: required field `{field}` not found")]
    MissingField { provider: Provider, field: &'static str },

    /// A field was located but its content does not have the expected shape
    #[error("{provider}: field `{field}` is malformed: {reason}")]
    MalformedField {
        provider: Provider,
        field: &'static str,
        reason: String,
    },

    /// An input buffer exceeds the bound the circuit was compiled for
    #[error("{provider}: `{field}` is {len} bytes, exceeds maximum of {max}")]
    BufferTooLong {
        provider: Provider,
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// Programming or configuration error; never retried
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Key transparency fetch failed for a domain
    #[error("Failed to fetch DKIM keys for {domain}: {reason}")]
    KeyFetch { domain: String, reason: String },

    /// Saved key hashes or field element text could not be parsed
    #[error("Key parse error: {0}")]
    KeyParse(String),

    /// Cryptographic backend could not be initialized
    #[error("Crypto backend error: {0}")]
    Backend(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl ExtractError {
    pub(crate) fn missing(provider: Provider, field: &'static str) -> Self {
        Self::MissingField { provider, field }
    }

    pub(crate) fn malformed(
        provider: Provider,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedField {
            provider,
            field,
            reason: reason.into(),
        }
    }

    /// Whether retrying with the same input could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::KeyFetch { .. })
    }
}

impl From<std::io::Error> for ExtractError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for ExtractError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;
