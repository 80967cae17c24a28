use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use super::limbs::{PublicKeyLimbs, split_into_limbs};
use crate::error::{ExtractError, Result};

/// Signer public key, either as the raw modulus or already split into limbs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PublicKeyMaterial {
    Modulus(BigUint),
    Limbs(PublicKeyLimbs),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureMaterial {
    Integer(BigUint),
    Limbs(Vec<u128>),
}

/// Header and body of an email whose DKIM signature was already verified.
///
/// Extractors only borrow it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub header: Vec<u8>,
    pub body: Vec<u8>,
    pub public_key: PublicKeyMaterial,
    pub signature: SignatureMaterial,
}

impl RawMessage {
    pub fn key_limbs(&self, count: usize) -> Result<PublicKeyLimbs> {
        match &self.public_key {
            PublicKeyMaterial::Modulus(modulus) => PublicKeyLimbs::from_modulus(modulus, count),
            PublicKeyMaterial::Limbs(limbs) => {
                if limbs.modulus.len() != count || limbs.redc.len() != count {
                    return Err(ExtractError::Invariant(format!(
                        "public key has {}/{} limbs, expected {}",
                        limbs.modulus.len(),
                        limbs.redc.len(),
                        count
                    )));
                }
                Ok(limbs.clone())
            }
        }
    }

    pub fn signature_limbs(&self, count: usize) -> Result<Vec<u128>> {
        match &self.signature {
            SignatureMaterial::Integer(value) => split_into_limbs(value, count),
            SignatureMaterial::Limbs(limbs) => {
                if limbs.len() != count {
                    return Err(ExtractError::Invariant(format!(
                        "signature has {} limbs, expected {}",
                        limbs.len(),
                        count
                    )));
                }
                Ok(limbs.clone())
            }
        }
    }
}
