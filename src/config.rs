use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    core::KEY_LIMBS_2048,
    error::{ExtractError, Result},
    hash::sha256::BLOCK_SIZE,
};

/// Circuit bounds for the raw header and body buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderLimits {
    pub max_header_len: usize,
    pub max_body_len: usize,
}

/// End-of-span adjustment applied after a closing anchor is found.
///
/// With `postfix` the offset of the closing anchor, the span ends at
/// `postfix + delimiter_offset` when that byte is `expected`, otherwise
/// `fallback_skip` bytes further (past a soft line break).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimRule {
    pub delimiter_offset: usize,
    pub expected: u8,
    pub fallback_skip: usize,
}

impl TrimRule {
    /// Exclusive end of a span whose closing anchor starts at `postfix`.
    pub fn span_end(&self, body: &[u8], postfix: usize) -> usize {
        let mut end = postfix + self.delimiter_offset;
        if body.get(end) != Some(&self.expected) {
            end += self.fallback_skip;
        }
        end + 1
    }
}

impl Default for TrimRule {
    fn default() -> Self {
        Self {
            delimiter_offset: 4,
            expected: b'>',
            fallback_skip: 3,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinodeConfig {
    pub limits: ProviderLimits,
    pub subject_marker: String,
    pub date_anchor: String,
    /// `chrono` format of the payment date text
    pub date_format: String,
}

impl Default for LinodeConfig {
    fn default() -> Self {
        Self {
            limits: ProviderLimits {
                max_header_len: 640,
                max_body_len: 832,
            },
            subject_marker: "Linode.com: Payment Receipt".to_string(),
            date_anchor: "Payment Date: ".to_string(),
            date_format: "%B %d, %Y".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitedConfig {
    pub limits: ProviderLimits,
    /// Upper bound on the bytes of one hash-aligned window
    pub max_window_len: usize,
    pub total_anchor: String,
    pub currency_anchor: String,
    pub date_anchor: String,
    pub line_anchor: String,
    pub cell_close_anchor: String,
    pub trim: TrimRule,
}

impl Default for UnitedConfig {
    fn default() -> Self {
        Self {
            limits: ProviderLimits {
                max_header_len: 640,
                max_body_len: 58560,
            },
            max_window_len: 2048,
            total_anchor: "Total:".to_string(),
            currency_anchor: "USD".to_string(),
            date_anchor: "2nd bag weight and dimensions".to_string(),
            line_anchor: "<br/>".to_string(),
            cell_close_anchor: "</td>".to_string(),
            trim: TrimRule::default(),
        }
    }
}

/// Byte offsets of the American Airlines total row markup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmericanAirlinesOffsets {
    /// Bytes between the label `<td ...>` end and the `<span`
    pub td_label_end_back: usize,
    /// Length of `<tr>` plus the whitespace before the label `<td`
    pub tr_prefix_len: usize,
    /// Bytes between the span `>` and the label text
    pub span_label_end_back: usize,
}

impl Default for AmericanAirlinesOffsets {
    fn default() -> Self {
        Self {
            td_label_end_back: 3,
            tr_prefix_len: 7,
            span_label_end_back: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmericanAirlinesConfig {
    pub limits: ProviderLimits,
    pub total_anchor: String,
    pub offsets: AmericanAirlinesOffsets,
}

impl Default for AmericanAirlinesConfig {
    fn default() -> Self {
        Self {
            limits: ProviderLimits {
                max_header_len: 640,
                max_body_len: 81856,
            },
            total_anchor: "Total cost".to_string(),
            offsets: AmericanAirlinesOffsets::default(),
        }
    }
}

/// Byte offsets of the Frontier total row markup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierOffsets {
    /// Bytes skipped after the amount cell's `>`: the `>` itself and one space
    pub amount_padding: usize,
}

impl Default for FrontierOffsets {
    fn default() -> Self {
        Self { amount_padding: 2 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontierConfig {
    pub limits: ProviderLimits,
    pub total_anchor: String,
    pub offsets: FrontierOffsets,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            limits: ProviderLimits {
                max_header_len: 640,
                max_body_len: 186560,
            },
            total_anchor: "Grand Total".to_string(),
            offsets: FrontierOffsets::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapsuleConfig {
    pub chunk_size: usize,
}

impl Default for CapsuleConfig {
    fn default() -> Self {
        Self { chunk_size: 2048 }
    }
}

/// Key transparency archive settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrarConfig {
    pub endpoint: String,
    pub attempts: u32,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
    /// Records per registry call
    pub batch_size: usize,
    pub min_key_bits: u64,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://archive.prove.email".to_string(),
            attempts: 3,
            retry_delay_ms: 1000,
            timeout_secs: 30,
            batch_size: 4,
            min_key_bits: 1024,
        }
    }
}

/// Top-level configuration. Every field falls back to its default when
/// omitted from a JSON override file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub linode: LinodeConfig,
    pub united: UnitedConfig,
    pub american_airlines: AmericanAirlinesConfig,
    pub frontier: FrontierConfig,
    pub capsule: CapsuleConfig,
    pub registrar: RegistrarConfig,
    /// Limb count used for RSA moduli and signatures
    pub key_limbs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            linode: LinodeConfig::default(),
            united: UnitedConfig::default(),
            american_airlines: AmericanAirlinesConfig::default(),
            frontier: FrontierConfig::default(),
            capsule: CapsuleConfig::default(),
            registrar: RegistrarConfig::default(),
            key_limbs: KEY_LIMBS_2048,
        }
    }
}

impl Config {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.capsule.chunk_size < BLOCK_SIZE {
            return Err(ExtractError::Config(format!(
                "capsule chunk size {} is below the {} byte block size",
                self.capsule.chunk_size, BLOCK_SIZE
            )));
        }
        if self.united.max_window_len % BLOCK_SIZE != 0 {
            return Err(ExtractError::Config(format!(
                "united window length {} is not a multiple of {}",
                self.united.max_window_len, BLOCK_SIZE
            )));
        }
        if self.registrar.batch_size == 0 {
            return Err(ExtractError::Config("registrar batch size must be positive".to_string()));
        }
        if self.registrar.attempts == 0 {
            return Err(ExtractError::Config("registrar needs at least one attempt".to_string()));
        }
        if self.key_limbs == 0 {
            return Err(ExtractError::Config("key limb count must be positive".to_string()));
        }
        Ok(())
    }
}
