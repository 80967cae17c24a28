//! DKIM key registration data.
//!
//! Published sender keys are fetched per domain, parsed, hashed over their
//! limb decomposition and grouped into fixed-size registry batches.

pub mod fetch;
pub mod parse;
pub mod registry;

use serde::{Deserialize, Serialize};
use tracing::info;

pub use fetch::{ArchiveKeySource, KeyEntry};
pub use parse::{domain_key_hashes, extract_p_tag, parse_dkim_key};
pub use registry::{DomainKeys, KeyHashTree, fetch_all, prepare_registration};

use crate::{
    core::FieldElement,
    error::{ExtractError, Result},
};

/// Registry id of an accepted sender domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[repr(u32)]
pub enum VerifierId {
    Amazon = 1,
    Linode = 2,
    Heroku = 3,
    Frontier = 4,
    United = 5,
    AmericanAirlines = 6,
    Delta = 7,
    Uber = 8,
    Lyft = 9,
}

/// Accepted domains; position + 1 is the verifier id.
pub const DOMAINS: [&str; 9] = [
    "amazon.com",
    "linode.com",
    "heroku.com",
    "flyfrontier.com",
    "united.com",
    "aa.com",
    "delta.com",
    "uber.com",
    "lyftmail.com",
];

impl VerifierId {
    pub const ALL: [VerifierId; 9] = [
        VerifierId::Amazon,
        VerifierId::Linode,
        VerifierId::Heroku,
        VerifierId::Frontier,
        VerifierId::United,
        VerifierId::AmericanAirlines,
        VerifierId::Delta,
        VerifierId::Uber,
        VerifierId::Lyft,
    ];

    pub fn id(&self) -> u32 {
        *self as u32
    }

    pub fn domain(&self) -> &'static str {
        DOMAINS[self.id() as usize - 1]
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|verifier| verifier.id() == id)
    }

    pub fn from_domain(domain: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|verifier| verifier.domain().eq_ignore_ascii_case(domain))
    }
}

/// One `(verifier, key hash)` registry entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DkimKeyRecord {
    #[serde(rename = "id")]
    pub verifier_id: u32,
    #[serde(rename = "keyHash")]
    pub key_hash: FieldElement,
}

impl DkimKeyRecord {
    /// Padding entry for the tail of the last batch.
    pub const EMPTY: Self = Self {
        verifier_id: 0,
        key_hash: FieldElement::ZERO,
    };

    pub fn is_empty(&self) -> bool {
        self.verifier_id == 0 && self.key_hash.is_zero()
    }
}

/// Groups records into batches of exactly `size`, padding the last one.
pub fn batch(records: Vec<DkimKeyRecord>, size: usize) -> Result<Vec<Vec<DkimKeyRecord>>> {
    if size == 0 {
        return Err(ExtractError::Invariant("batch size must be positive".to_string()));
    }
    let total = records.len();
    let mut batches: Vec<Vec<DkimKeyRecord>> = records.chunks(size).map(<[_]>::to_vec).collect();
    if let Some(last) = batches.last_mut() {
        last.resize(size, DkimKeyRecord::EMPTY);
    }
    info!(records = total, batches = batches.len(), size, "prepared registry batches");
    Ok(batches)
}
