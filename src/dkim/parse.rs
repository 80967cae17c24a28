use base64::Engine;
use num_bigint::BigUint;
use rsa::{
    RsaPublicKey, pkcs1::DecodeRsaPublicKey, pkcs8::DecodePublicKey, traits::PublicKeyParts,
};
use tracing::warn;

use super::fetch::KeyEntry;
use crate::{
    core::{
        FieldElement, KeyHasher,
        limbs::{limb_count, split_into_limbs},
    },
    error::Result,
};

const ENGINE: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Value of a `p=` tag that is the last tag of the record.
///
/// The value runs to the end of the record, optionally followed by a single
/// `;`, and may not contain `;` itself.
pub fn extract_p_tag(record: &str) -> Option<&str> {
    record.match_indices("p=").find_map(|(pos, _)| {
        let rest = &record[pos + 2 ..];
        let value = rest.strip_suffix(';').unwrap_or(rest);
        (!value.is_empty() && !value.contains(';')).then_some(value)
    })
}

/// Decodes a base64 DER public key and returns its modulus.
///
/// Accepts SubjectPublicKeyInfo or bare PKCS#1. Returns `None` for keys that
/// do not parse or are smaller than `min_bits`.
pub fn parse_dkim_key(encoded: &str, min_bits: u64) -> Option<BigUint> {
    let mut text: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    while text.len() % 4 != 0 {
        text.push('=');
    }
    let der = match ENGINE.decode(text.as_bytes()) {
        Ok(der) => der,
        Err(e) => {
            warn!(error = %e, "skipping key with invalid base64");
            return None;
        }
    };
    let parsed = RsaPublicKey::from_public_key_der(&der)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(&der));
    let key = match parsed {
        Ok(key) => key,
        Err(e) => {
            warn!(error = %e, "skipping key that is not RSA DER");
            return None;
        }
    };
    let modulus = BigUint::from_bytes_be(&key.n().to_bytes_be());
    if modulus.bits() < min_bits {
        warn!(bits = modulus.bits(), min_bits, "skipping undersized key");
        return None;
    }
    Some(modulus)
}

/// Distinct moduli from a domain's key records, in first-seen order.
pub fn unique_keys(entries: &[KeyEntry], min_bits: u64) -> Vec<BigUint> {
    let mut keys: Vec<BigUint> = Vec::new();
    for entry in entries {
        let Some(encoded) = extract_p_tag(&entry.value) else {
            continue;
        };
        if let Some(key) = parse_dkim_key(encoded, min_bits) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}

/// Registry hash of each key over its `ceil(bits / 120)` limbs.
pub fn domain_key_hashes(keys: &[BigUint], hasher: &dyn KeyHasher) -> Result<Vec<FieldElement>> {
    keys.iter()
        .map(|key| {
            let limbs = split_into_limbs(key, limb_count(key.bits()))?;
            Ok(hasher.hash_limbs(&limbs))
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::backend::Sha256Backend;

    /// 1024-bit key in SubjectPublicKeyInfo form.
    pub(crate) const KEY_1024: &str = concat!(
        "MIGfMA0GCSqGSIb3DQEBAQUAA4GNADCBiQKBgQDlcBLnr7iNz29ogNFu6uECRkwGqcXbY7GO",
        "CSZUVy1/grRnesVuF6W9WY+fxpeUm35mKLHFc6oiblFB+meifUInbLznyvPyqdghIbFPlvoJ",
        "DS2tiBNIt0zNo6i3ieIWW0romTKlY1YqavcuQQoeDi0NNnIAFU38T7ba/pOxzP9YnQIDAQAB",
    );
    const MODULUS_1024: &str = concat!(
        "E57012E7AFB88DCF6F6880D16EEAE102464C06A9C5DB63B18E092654572D7F82B4677AC5",
        "6E17A5BD598F9FC697949B7E6628B1C573AA226E5141FA67A27D42276CBCE7CAF3F2A9D8",
        "2121B14F96FA090D2DAD881348B74CCDA3A8B789E2165B4AE89932A563562A6AF72E410A",
        "1E0E2D0D367200154DFC4FB6DAFE93B1CCFF589D",
    );
    /// 512-bit key, padding stripped.
    pub(crate) const KEY_512_UNPADDED: &str = concat!(
        "MFwwDQYJKoZIhvcNAQEBBQADSwAwSAJBALR/dqCBPys1FIcvf6C5a0GI9NycltQRHPgpcHiO",
        "RwnodG/YRg2okWpmYalQoA5pn8MPqrQ0aypLquO5VyNhJuECAwEAAQ",
    );

    pub(crate) fn entry(value: &str) -> KeyEntry {
        KeyEntry {
            domain: Some("linode.com".to_string()),
            selector: Some("mail".to_string()),
            first_seen_at: Some("2023-01-01T00:00:00Z".to_string()),
            last_seen_at: Some("2024-01-01T00:00:00Z".to_string()),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_p_tag_must_be_last() {
        assert_eq!(extract_p_tag("v=DKIM1; k=rsa; p=ABCD"), Some("ABCD"));
        assert_eq!(extract_p_tag("v=DKIM1; k=rsa; p=ABCD;"), Some("ABCD"));
        assert_eq!(extract_p_tag("v=DKIM1; p=ABCD; t=s"), None);
        assert_eq!(extract_p_tag("v=DKIM1; p=;"), None);
        assert_eq!(extract_p_tag("v=DKIM1; k=rsa"), None);
    }

    #[test]
    fn test_parse_spki_key() {
        let modulus = parse_dkim_key(KEY_1024, 1024).unwrap();
        assert_eq!(modulus, BigUint::parse_bytes(MODULUS_1024.as_bytes(), 16).unwrap());
        assert_eq!(modulus.bits(), 1024);
    }

    #[test]
    fn test_padding_is_restored_and_size_enforced() {
        let modulus = parse_dkim_key(KEY_512_UNPADDED, 512).unwrap();
        assert_eq!(modulus.bits(), 512);
        assert!(parse_dkim_key(KEY_512_UNPADDED, 1024).is_none());
    }

    #[test]
    fn test_garbage_is_skipped() {
        assert!(parse_dkim_key("not base64 at all!", 1024).is_none());
        assert!(parse_dkim_key("AAAA", 1024).is_none());
    }

    #[test]
    fn test_unique_keys_keep_first_seen_order() {
        let with_spaces = format!("v=DKIM1; k=rsa; p={} {}", &KEY_1024[.. 40], &KEY_1024[40 ..]);
        let entries = vec![
            entry(&format!("v=DKIM1; k=rsa; p={}", KEY_1024)),
            entry(&format!("v=DKIM1; k=rsa; p={}", KEY_512_UNPADDED)),
            entry(&with_spaces),
            entry("v=DKIM1; p=revoked; t=y"),
        ];
        let keys = unique_keys(&entries, 1024);
        assert_eq!(keys.len(), 1);

        let keys = unique_keys(&entries, 512);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].bits(), 1024);
        assert_eq!(keys[1].bits(), 512);
    }

    #[test]
    fn test_key_hash_uses_minimal_limbs() {
        let backend = Sha256Backend::initialize().unwrap();
        let modulus = parse_dkim_key(KEY_1024, 1024).unwrap();
        let hashes = domain_key_hashes(&[modulus.clone()], &backend).unwrap();

        // 1024 bits fit in nine 120-bit limbs
        let limbs = split_into_limbs(&modulus, 9).unwrap();
        assert_eq!(hashes, vec![backend.hash_limbs(&limbs)]);
        assert_eq!(hashes[0].0[0], 0);
    }
}
