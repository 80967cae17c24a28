//! Per-sender field extraction.
//!
//! Every provider shares the header work in [`EmailInputs::build`] and adds
//! its own body spans on top.

pub mod amount;
pub mod american_airlines;
pub mod frontier;
pub mod linode;
pub mod united;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::debug;

pub use amount::{Amount, find_currency};
pub use american_airlines::{AmericanAirlinesInputs, TotalCostIndices};
pub use frontier::{FrontierInputs, PurchaseTotalIndices};
pub use linode::LinodeInputs;
pub use united::UnitedInputs;

use crate::{
    config::{Config, ProviderLimits},
    core::{BoundedBytes, PartialHasher, PublicKeyLimbs, RawMessage, SequenceSpan},
    dkim::VerifierId,
    error::{ExtractError, Result},
    locator::{self, HeaderField, locate_header_field},
};

/// Receipt senders with a dedicated extraction template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provider {
    Linode,
    United,
    AmericanAirlines,
    Frontier,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Linode,
        Provider::United,
        Provider::AmericanAirlines,
        Provider::Frontier,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Linode => "linode",
            Self::United => "united",
            Self::AmericanAirlines => "american-airlines",
            Self::Frontier => "frontier",
        }
    }

    /// Registry id of the sending domain.
    pub fn verifier_id(&self) -> VerifierId {
        match self {
            Self::Linode => VerifierId::Linode,
            Self::United => VerifierId::United,
            Self::AmericanAirlines => VerifierId::AmericanAirlines,
            Self::Frontier => VerifierId::Frontier,
        }
    }

    pub fn limits(&self, config: &Config) -> ProviderLimits {
        match self {
            Self::Linode => config.linode.limits,
            Self::United => config.united.limits,
            Self::AmericanAirlines => config.american_airlines.limits,
            Self::Frontier => config.frontier.limits,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Provider {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|provider| provider.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ExtractError::Config(format!("unknown provider `{}`", s)))
    }
}

/// Inputs shared by every email verifier circuit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailInputs {
    pub header: BoundedBytes,
    /// `None` when the body travels in hash-aligned windows instead
    pub body: Option<BoundedBytes>,
    /// Offset just after `bh=` in the header
    pub body_hash_index: usize,
    pub dkim_header_sequence: SequenceSpan,
    pub from: SequenceSpan,
    pub subject: SequenceSpan,
    pub pubkey: PublicKeyLimbs,
    pub signature: Vec<u128>,
}

impl EmailInputs {
    /// Bounds the buffers and locates the header fields every circuit checks.
    pub fn build(
        provider: Provider,
        msg: &RawMessage,
        limits: ProviderLimits,
        key_limbs: usize,
        bound_body: bool,
    ) -> Result<Self> {
        let header = bounded(provider, "header", &msg.header, limits.max_header_len)?;
        let body = if bound_body {
            Some(bounded(provider, "body", &msg.body, limits.max_body_len)?)
        } else {
            None
        };

        let body_hash_index = locator::find(&msg.header, b"bh=")
            .map(|pos| pos + 3)
            .ok_or_else(|| ExtractError::missing(provider, "body_hash_index"))?;
        let dkim_header_sequence = header_field(provider, &msg.header, HeaderField::DkimSignature)?;
        let from = header_field(provider, &msg.header, HeaderField::From)?;
        let subject = header_field(provider, &msg.header, HeaderField::Subject)?;

        Ok(Self {
            header,
            body,
            body_hash_index,
            dkim_header_sequence,
            from,
            subject,
            pubkey: msg.key_limbs(key_limbs)?,
            signature: msg.signature_limbs(key_limbs)?,
        })
    }
}

pub(crate) fn bounded(
    provider: Provider,
    field: &'static str,
    bytes: &[u8],
    max: usize,
) -> Result<BoundedBytes> {
    BoundedBytes::fit(bytes, max).ok_or(ExtractError::BufferTooLong {
        provider,
        field,
        len: bytes.len(),
        max,
    })
}

fn header_field(provider: Provider, header: &[u8], field: HeaderField) -> Result<SequenceSpan> {
    let label = field.label();
    let span =
        locate_header_field(header, field).ok_or_else(|| ExtractError::missing(provider, label))?;
    debug!(%provider, field = label, index = span.index, length = span.length, "located field");
    Ok(span)
}

/// Provider-specific extraction result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extraction {
    Linode(LinodeInputs),
    United(UnitedInputs),
    AmericanAirlines(AmericanAirlinesInputs),
    Frontier(FrontierInputs),
}

impl Extraction {
    pub fn provider(&self) -> Provider {
        match self {
            Self::Linode(_) => Provider::Linode,
            Self::United(_) => Provider::United,
            Self::AmericanAirlines(_) => Provider::AmericanAirlines,
            Self::Frontier(_) => Provider::Frontier,
        }
    }

    pub fn email(&self) -> &EmailInputs {
        match self {
            Self::Linode(inputs) => &inputs.email,
            Self::United(inputs) => &inputs.email,
            Self::AmericanAirlines(inputs) => &inputs.email,
            Self::Frontier(inputs) => &inputs.email,
        }
    }
}

/// Runs the extraction template of `provider` over a verified message.
///
/// `hasher` is only consulted by windowed providers.
pub fn extract(
    provider: Provider,
    msg: &RawMessage,
    config: &Config,
    hasher: &dyn PartialHasher,
) -> Result<Extraction> {
    let limbs = config.key_limbs;
    let extraction = match provider {
        Provider::Linode => Extraction::Linode(linode::extract(msg, &config.linode, limbs)?),
        Provider::United => {
            Extraction::United(united::extract(msg, &config.united, limbs, hasher)?)
        }
        Provider::AmericanAirlines => Extraction::AmericanAirlines(american_airlines::extract(
            msg,
            &config.american_airlines,
            limbs,
        )?),
        Provider::Frontier => {
            Extraction::Frontier(frontier::extract(msg, &config.frontier, limbs)?)
        }
    };
    Ok(extraction)
}
