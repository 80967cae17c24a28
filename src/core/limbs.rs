use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};

/// Width of one bignum limb as the circuit library lays them out.
pub const LIMB_BITS: u64 = 120;

/// Limb count for a 2048-bit RSA modulus or signature.
pub const KEY_LIMBS_2048: usize = 18;

/// Extra bits in the Barrett reduction parameter.
pub const BARRETT_OVERFLOW_BITS: u64 = 4;

/// Number of 120-bit limbs needed to hold `bits` bits.
pub fn limb_count(bits: u64) -> usize {
    bits.div_ceil(LIMB_BITS).max(1) as usize
}

/// Splits `value` into `count` little-endian 120-bit limbs.
pub fn split_into_limbs(value: &BigUint, count: usize) -> Result<Vec<u128>> {
    if value.bits() > LIMB_BITS * count as u64 {
        return Err(ExtractError::Invariant(format!(
            "{}-bit value does not fit in {} limbs",
            value.bits(),
            count
        )));
    }
    let mask = (BigUint::one() << LIMB_BITS) - BigUint::one();
    let mut rest = value.clone();
    let mut limbs = Vec::with_capacity(count);
    for _ in 0 .. count {
        let limb = (&rest & &mask)
            .to_u128()
            .ok_or_else(|| ExtractError::Invariant("limb exceeds 120 bits".to_string()))?;
        limbs.push(limb);
        rest >>= LIMB_BITS;
    }
    Ok(limbs)
}

/// Barrett reduction parameter `floor(2^(2k + overflow) / modulus)`.
pub fn barrett_redc(modulus: &BigUint) -> Result<BigUint> {
    if modulus.is_zero() {
        return Err(ExtractError::Invariant("modulus is zero".to_string()));
    }
    let k = modulus.bits();
    Ok((BigUint::one() << (2 * k + BARRETT_OVERFLOW_BITS)) / modulus)
}

/// RSA public key in the limb layout the circuit consumes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyLimbs {
    pub modulus: Vec<u128>,
    pub redc: Vec<u128>,
}

impl PublicKeyLimbs {
    pub fn from_modulus(modulus: &BigUint, count: usize) -> Result<Self> {
        let redc = barrett_redc(modulus)?;
        Ok(Self {
            modulus: split_into_limbs(modulus, count)?,
            redc: split_into_limbs(&redc, count)?,
        })
    }
}
