use std::{collections::BTreeMap, path::Path, thread};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{DkimKeyRecord, VerifierId, batch, parse};
use crate::{
    core::{FieldElement, KeyHasher, KeySource},
    error::{ExtractError, Result},
};

/// Saved key hashes, grouped under arbitrary named categories.
///
/// An object with both `id` and `keyHashes` is a leaf; any other object is a
/// map of named subtrees. Other JSON values are ignored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyHashTree {
    Leaf {
        id: u32,
        #[serde(rename = "keyHashes")]
        key_hashes: Vec<FieldElement>,
    },
    Node(BTreeMap<String, KeyHashTree>),
    Other(serde_json::Value),
}

impl KeyHashTree {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ExtractError::KeyParse(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path.as_ref())?)
    }

    pub fn subtree(&self, name: &str) -> Option<&KeyHashTree> {
        match self {
            Self::Node(children) => children.get(name),
            _ => None,
        }
    }

    /// Records of every leaf, visiting children in key order.
    pub fn records(&self) -> Result<Vec<DkimKeyRecord>> {
        let mut out = Vec::new();
        self.walk(&mut out)?;
        Ok(out)
    }

    fn walk(&self, out: &mut Vec<DkimKeyRecord>) -> Result<()> {
        match self {
            Self::Leaf { id, key_hashes } => {
                out.extend(key_hashes.iter().map(|key_hash| DkimKeyRecord {
                    verifier_id: *id,
                    key_hash: *key_hash,
                }));
            }
            Self::Node(children) => {
                // a leaf that failed to parse lands here with its raw fields
                if children.contains_key("id") && children.contains_key("keyHashes") {
                    return Err(ExtractError::KeyParse(
                        "entry with `id` and `keyHashes` is malformed".to_string(),
                    ));
                }
                for child in children.values() {
                    child.walk(out)?;
                }
            }
            Self::Other(_) => {}
        }
        Ok(())
    }

    /// Tree with one leaf per domain, keyed by domain name.
    pub fn from_domains(domains: &[DomainKeys]) -> Self {
        Self::Node(
            domains
                .iter()
                .map(|keys| {
                    (
                        keys.verifier.domain().to_string(),
                        Self::Leaf {
                            id: keys.verifier.id(),
                            key_hashes: keys.hashes.clone(),
                        },
                    )
                })
                .collect(),
        )
    }
}

/// Registry batches from a saved tree, optionally restricted to one
/// top-level category such as `hosting`.
pub fn prepare_registration(
    tree: &KeyHashTree,
    category: Option<&str>,
    batch_size: usize,
) -> Result<Vec<Vec<DkimKeyRecord>>> {
    let root = match category {
        Some(name) => tree
            .subtree(name)
            .ok_or_else(|| ExtractError::KeyParse(format!("no `{}` category", name)))?,
        None => tree,
    };
    batch(root.records()?, batch_size)
}

/// Key hashes for one verifier domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainKeys {
    pub verifier: VerifierId,
    pub hashes: Vec<FieldElement>,
}

fn domain_keys(
    source: &dyn KeySource,
    verifier: VerifierId,
    min_key_bits: u64,
    hasher: &dyn KeyHasher,
) -> Result<DomainKeys> {
    let entries = source.fetch(verifier.domain())?;
    let keys = parse::unique_keys(&entries, min_key_bits);
    let hashes = parse::domain_key_hashes(&keys, hasher)?;
    info!(
        domain = verifier.domain(),
        records = entries.len(),
        keys = hashes.len(),
        "hashed domain keys"
    );
    Ok(DomainKeys { verifier, hashes })
}

/// Fetches and hashes every domain in parallel.
///
/// Results come back in input order; a failing domain does not affect the
/// others.
pub fn fetch_all(
    source: &dyn KeySource,
    verifiers: &[VerifierId],
    min_key_bits: u64,
    hasher: &dyn KeyHasher,
) -> Vec<Result<DomainKeys>> {
    thread::scope(|scope| {
        let handles: Vec<_> = verifiers
            .iter()
            .map(|verifier| {
                scope.spawn(move || domain_keys(source, *verifier, min_key_bits, hasher))
            })
            .collect();
        handles
            .into_iter()
            .zip(verifiers)
            .map(|(handle, verifier)| {
                let result = handle.join().unwrap_or_else(|_| {
                    Err(ExtractError::KeyFetch {
                        domain: verifier.domain().to_string(),
                        reason: "fetch thread panicked".to_string(),
                    })
                });
                if let Err(e) = &result {
                    warn!(
                        domain = verifier.domain(),
                        transient = e.is_transient(),
                        error = %e,
                        "domain failed"
                    );
                }
                result
            })
            .collect()
    })
}
