//! Contract call arguments.
//!
//! Each provider's extraction maps onto the exact argument list of its
//! verifier call: `u8` buffers, `u32` offsets and `u128` limbs. Anything the
//! call does not take is dropped here.

use serde::{Deserialize, Serialize};

use crate::{
    align::AlignedWindow,
    capsule::CapsuleSet,
    config::Config,
    core::{BoundedBytes, SequenceSpan},
    error::{ExtractError, Result},
    providers::{
        AmericanAirlinesInputs, EmailInputs, Extraction, FrontierInputs, LinodeInputs, UnitedInputs,
    },
};

/// Limbs as `0x` hex strings, readable by clients without 128-bit integers.
mod limbs_hex {
    use serde::{Deserialize, Deserializer, Serializer, ser::SerializeSeq};

    pub fn serialize<S: Serializer>(limbs: &[u128], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(limbs.len()))?;
        for limb in limbs {
            seq.serialize_element(&format!("0x{:x}", limb))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u128>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|text| {
                let digits = text.strip_prefix("0x").unwrap_or(text);
                u128::from_str_radix(digits, 16).map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

fn to_u32(value: usize, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        ExtractError::Invariant(format!("{} = {} does not fit in u32", field, value))
    })
}

/// `{index, length}` pair as the contract takes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireSpan {
    pub index: u32,
    pub length: u32,
}

impl WireSpan {
    pub fn from_span(span: SequenceSpan, field: &str) -> Result<Self> {
        Ok(Self {
            index: to_u32(span.index, field)?,
            length: to_u32(span.length, field)?,
        })
    }
}

/// Arguments every verifier call starts with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailArgs {
    pub header: Vec<u8>,
    pub header_length: u32,
    #[serde(with = "limbs_hex")]
    pub pubkey_modulus: Vec<u128>,
    #[serde(with = "limbs_hex")]
    pub pubkey_redc: Vec<u128>,
    #[serde(with = "limbs_hex")]
    pub signature: Vec<u128>,
    pub dkim_header_sequence: WireSpan,
    pub body_hash_index: u32,
    pub from_index: u32,
    pub subject_index: u32,
}

impl EmailArgs {
    pub fn from_inputs(inputs: &EmailInputs) -> Result<Self> {
        Ok(Self {
            header: inputs.header.storage.clone(),
            header_length: to_u32(inputs.header.len, "header_length")?,
            pubkey_modulus: inputs.pubkey.modulus.clone(),
            pubkey_redc: inputs.pubkey.redc.clone(),
            signature: inputs.signature.clone(),
            dkim_header_sequence: WireSpan::from_span(
                inputs.dkim_header_sequence,
                "dkim_header_sequence",
            )?,
            body_hash_index: to_u32(inputs.body_hash_index, "body_hash_index")?,
            from_index: to_u32(inputs.from.index, "from_index")?,
            subject_index: to_u32(inputs.subject.index, "subject_index")?,
        })
    }
}

fn body_args(inputs: &EmailInputs) -> Result<(Vec<u8>, u32)> {
    let body = inputs
        .body
        .as_ref()
        .ok_or_else(|| ExtractError::Invariant("call needs the bounded body".to_string()))?;
    Ok((body.storage.clone(), to_u32(body.len, "body_length")?))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinodeCall {
    #[serde(flatten)]
    pub email: EmailArgs,
    pub body: Vec<u8>,
    pub body_length: u32,
    pub amount_index: u32,
    pub amount_length: u32,
    pub date_index: u32,
    pub receipt_id_length: u32,
}

impl LinodeCall {
    pub fn from_inputs(inputs: &LinodeInputs) -> Result<Self> {
        let (body, body_length) = body_args(&inputs.email)?;
        Ok(Self {
            email: EmailArgs::from_inputs(&inputs.email)?,
            body,
            body_length,
            amount_index: to_u32(inputs.amount.span.index, "amount_index")?,
            amount_length: to_u32(inputs.amount.span.length, "amount_length")?,
            date_index: to_u32(inputs.date_index, "date_index")?,
            receipt_id_length: to_u32(inputs.receipt_id_length, "receipt_id_length")?,
        })
    }
}

/// One hash-aligned body window with the state that precedes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowArgs {
    pub partial_hash: [u32; 8],
    /// Bytes folded into `partial_hash`
    pub partial_length: u32,
    /// Window bytes, zero padded to the window capacity
    pub body: Vec<u8>,
    pub body_length: u32,
}

impl WindowArgs {
    pub fn from_window(window: &AlignedWindow, capacity: usize) -> Result<Self> {
        let padded = BoundedBytes::fit(&window.bytes, capacity).ok_or_else(|| {
            ExtractError::Invariant(format!(
                "window of {} bytes exceeds capacity {}",
                window.len(),
                capacity
            ))
        })?;
        Ok(Self {
            partial_hash: window.partial_hash.state,
            partial_length: to_u32(window.partial_hash.absorbed, "partial_length")?,
            body: padded.storage,
            body_length: to_u32(padded.len, "window body_length")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitedCall {
    #[serde(flatten)]
    pub email: EmailArgs,
    pub amount_window: WindowArgs,
    pub date_window: WindowArgs,
    /// Relative to `amount_window`
    pub amount_sequence: WireSpan,
    /// Relative to `date_window`
    pub date_sequence: WireSpan,
    /// Relative to `date_window`
    pub airport_sequence: WireSpan,
    pub amount_to_date_length: u32,
    pub remaining_length: u32,
    pub actual_length: u32,
}

/// A United call with the capsules that must be delivered before it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitedSubmission {
    pub call: UnitedCall,
    /// Delivery order: the body after the date window, then the gap between windows
    pub capsules: Vec<CapsuleSet>,
}

impl UnitedSubmission {
    pub fn from_inputs(
        inputs: &UnitedInputs,
        window_capacity: usize,
        chunk_size: usize,
    ) -> Result<Self> {
        let local = |window: &AlignedWindow, at: usize, field: &str| -> Result<WireSpan> {
            let span = window
                .spans
                .get(at)
                .ok_or_else(|| {
                    ExtractError::Invariant(format!("window is missing the {} span", field))
                })?;
            WireSpan::from_span(span.local(), field)
        };

        let deferred = &inputs.deferred;
        let call = UnitedCall {
            email: EmailArgs::from_inputs(&inputs.email)?,
            amount_window: WindowArgs::from_window(&inputs.amount_window, window_capacity)?,
            date_window: WindowArgs::from_window(&inputs.date_window, window_capacity)?,
            amount_sequence: local(&inputs.amount_window, 0, "amount_sequence")?,
            date_sequence: local(&inputs.date_window, 0, "date_sequence")?,
            airport_sequence: local(&inputs.date_window, 1, "airport_sequence")?,
            amount_to_date_length: to_u32(deferred.between.len(), "amount_to_date_length")?,
            remaining_length: to_u32(deferred.remaining.len(), "remaining_length")?,
            actual_length: to_u32(deferred.actual_length, "actual_length")?,
        };
        Ok(Self {
            call,
            capsules: deferred.capsules(chunk_size)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmericanAirlinesCall {
    #[serde(flatten)]
    pub email: EmailArgs,
    pub body: Vec<u8>,
    pub body_length: u32,
    pub total_cost_indices: [u32; 5],
}

impl AmericanAirlinesCall {
    pub fn from_inputs(inputs: &AmericanAirlinesInputs) -> Result<Self> {
        let (body, body_length) = body_args(&inputs.email)?;
        let mut total_cost_indices = [0u32; 5];
        for (slot, value) in total_cost_indices.iter_mut().zip(inputs.total_cost.to_array()) {
            *slot = to_u32(value, "total_cost_indices")?;
        }
        Ok(Self {
            email: EmailArgs::from_inputs(&inputs.email)?,
            body,
            body_length,
            total_cost_indices,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierCall {
    #[serde(flatten)]
    pub email: EmailArgs,
    pub body: Vec<u8>,
    pub body_length: u32,
    pub purchase_total_indices: [u32; 4],
}

impl FrontierCall {
    pub fn from_inputs(inputs: &FrontierInputs) -> Result<Self> {
        let (body, body_length) = body_args(&inputs.email)?;
        let mut purchase_total_indices = [0u32; 4];
        let values = inputs.purchase_total.to_array();
        for (slot, value) in purchase_total_indices.iter_mut().zip(values) {
            *slot = to_u32(value, "purchase_total_indices")?;
        }
        Ok(Self {
            email: EmailArgs::from_inputs(&inputs.email)?,
            body,
            body_length,
            purchase_total_indices,
        })
    }
}

/// Formatted call for any provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", content = "call", rename_all = "kebab-case")]
pub enum ContractCall {
    Linode(LinodeCall),
    United(UnitedSubmission),
    AmericanAirlines(AmericanAirlinesCall),
    Frontier(FrontierCall),
}

pub fn format_call(extraction: &Extraction, config: &Config) -> Result<ContractCall> {
    let call = match extraction {
        Extraction::Linode(inputs) => ContractCall::Linode(LinodeCall::from_inputs(inputs)?),
        Extraction::United(inputs) => ContractCall::United(UnitedSubmission::from_inputs(
            inputs,
            config.united.max_window_len,
            config.capsule.chunk_size,
        )?),
        Extraction::AmericanAirlines(inputs) => {
            ContractCall::AmericanAirlines(AmericanAirlinesCall::from_inputs(inputs)?)
        }
        Extraction::Frontier(inputs) => ContractCall::Frontier(FrontierCall::from_inputs(inputs)?),
    };
    Ok(call)
}

#[cfg(test)]
mod tests {
    use num_bigint::BigUint;

    use super::*;
    use crate::{
        backend::mock::CountingBackend,
        core::{PublicKeyMaterial, RawMessage, SignatureMaterial},
        providers::{Provider, extract},
    };

    fn message(subject: &str, body: &[u8]) -> RawMessage {
        let header = format!(
            "from:Billing <billing@linode.com>\r\nsubject:{}\r\n\
dkim-signature:v=1; d=linode.com; bh=abc=; b=",
            subject
        );
        RawMessage {
            header: header.into_bytes(),
            body: body.to_vec(),
            public_key: PublicKeyMaterial::Modulus(BigUint::from(0xC0FF_EE01u32)),
            signature: SignatureMaterial::Integer(BigUint::from(7u32)),
        }
    }

    #[test]
    fn test_wire_span_overflow() {
        let span = SequenceSpan {
            index: u32::MAX as usize + 1,
            length: 1,
        };
        assert!(matches!(WireSpan::from_span(span, "x"), Err(ExtractError::Invariant(_))));
    }

    #[test]
    fn test_linode_call_shape() {
        let backend = CountingBackend::new().unwrap();
        let config = Config::default();
        let msg = message(
            "Linode.com: Payment Receipt [12345]",
            b"Paid $22.00\r\nPayment Date: September 1, 2024\r\n",
        );
        let extraction = extract(Provider::Linode, &msg, &config, &backend).unwrap();
        let ContractCall::Linode(call) = format_call(&extraction, &config).unwrap() else {
            panic!("expected a linode call");
        };

        assert_eq!(call.email.header.len(), 640);
        assert_eq!(call.email.header_length as usize, msg.header.len());
        assert_eq!(call.body.len(), 832);
        assert_eq!(call.amount_index, 5);
        assert_eq!(call.amount_length, 6);
        assert_eq!(call.receipt_id_length, 5);
        assert_eq!(call.email.pubkey_modulus.len(), 18);
        assert_eq!(call.email.pubkey_modulus[0], 0xC0FF_EE01);

        let json = serde_json::to_value(ContractCall::Linode(call)).unwrap();
        assert_eq!(json["provider"], "linode");
        // shared arguments sit next to the provider ones
        assert!(json["call"]["body_hash_index"].is_u64());
        assert!(json["call"]["receipt_id_length"].is_u64());
        assert_eq!(json["call"]["pubkey_modulus"][0], "0xc0ffee01");
        assert_eq!(json["call"]["signature"][0], "0x7");

        let back: ContractCall = serde_json::from_value(json).unwrap();
        assert!(matches!(back, ContractCall::Linode(call) if call.receipt_id_length == 5));
    }

    #[test]
    fn test_american_airlines_call_shape() {
        let backend = CountingBackend::new().unwrap();
        let config = Config::default();
        let body: &[u8] = b"<table>\r\n<tr>\r\n <td class=\"label\">\r\n\
<span class=\"strong\">Total cost</span></td>\r\n <td class=\"amount\">$1,234.56</td>\r\n\
</tr>\r\n</table>\r\n";
        let msg = message("Your trip confirmation", body);
        let extraction = extract(Provider::AmericanAirlines, &msg, &config, &backend).unwrap();
        let ContractCall::AmericanAirlines(call) = format_call(&extraction, &config).unwrap() else {
            panic!("expected an american airlines call");
        };

        assert_eq!(call.total_cost_indices, [9, 17, 20, 18, 9]);
        assert_eq!(call.body.len(), config.american_airlines.limits.max_body_len);
        assert_eq!(call.body_length as usize, body.len());
        assert_eq!(&call.body[.. body.len()], body);
        assert!(call.body[body.len() ..].iter().all(|b| *b == 0));

        let json = serde_json::to_value(ContractCall::AmericanAirlines(call)).unwrap();
        assert_eq!(json["provider"], "american-airlines");
        assert_eq!(json["call"]["total_cost_indices"].as_array().map(Vec::len), Some(5));
        assert!(json["call"]["total_cost_indices"][0].is_u64());
    }

    #[test]
    fn test_frontier_call_shape() {
        let backend = CountingBackend::new().unwrap();
        let config = Config::default();
        let body: &[u8] = b"<table><tr><td>Fare</td><td> $200.00</td></tr>\r\n\
<tr>\r\n<td class=\"label\">Grand Total</td>\r\n\
<td class=\"amount\"> $245.10</td>\r\n</tr></table>\r\n";
        let msg = message("Your Frontier itinerary", body);
        let extraction = extract(Provider::Frontier, &msg, &config, &backend).unwrap();
        let ContractCall::Frontier(call) = format_call(&extraction, &config).unwrap() else {
            panic!("expected a frontier call");
        };

        assert_eq!(call.purchase_total_indices, [48, 17, 18, 7]);
        assert_eq!(call.body.len(), config.frontier.limits.max_body_len);
        assert_eq!(call.body_length as usize, body.len());
        assert_eq!(call.email.header.len(), config.frontier.limits.max_header_len);
        assert_eq!(backend.partial_calls(), 0);

        let json = serde_json::to_value(ContractCall::Frontier(call)).unwrap();
        assert_eq!(json["provider"], "frontier");
        assert_eq!(json["call"]["purchase_total_indices"][3], 7);
    }
}
