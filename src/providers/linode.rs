use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Amount, EmailInputs, Provider, find_currency};
use crate::{
    config::LinodeConfig,
    core::{RawMessage, SequenceSpan},
    error::{ExtractError, Result},
    locator,
};

const PROVIDER: Provider = Provider::Linode;

/// Hosting bill fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinodeInputs {
    pub email: EmailInputs,
    pub amount: Amount,
    /// First byte of the payment date text
    pub date_index: usize,
    /// Payment date as a unix timestamp at midnight UTC
    pub paid_at: i64,
    /// Characters between the brackets of the subject receipt number
    pub receipt_id_length: usize,
}

pub fn extract(msg: &RawMessage, config: &LinodeConfig, key_limbs: usize) -> Result<LinodeInputs> {
    let email = EmailInputs::build(PROVIDER, msg, config.limits, key_limbs, true)?;

    let amount = find_currency(&msg.body).ok_or_else(|| ExtractError::missing(PROVIDER, "amount"))?;
    debug!(index = amount.span.index, text = %amount.text, "located linode amount");

    let date_index = locator::find(&msg.body, config.date_anchor.as_bytes())
        .map(|pos| pos + config.date_anchor.len())
        .ok_or_else(|| ExtractError::missing(PROVIDER, "date"))?;
    let paid_at = parse_date(&msg.body[date_index ..], &config.date_format)?;

    let subject = email.subject.slice(&msg.header);
    let receipt_id_length = receipt_id_length(subject, &config.subject_marker)?;

    Ok(LinodeInputs {
        email,
        amount,
        date_index,
        paid_at,
        receipt_id_length,
    })
}

/// Parses the date text that runs up to the next tag or line break.
fn parse_date(text: &[u8], format: &str) -> Result<i64> {
    let end = text
        .iter()
        .position(|b| matches!(*b, b'<' | b'\r' | b'\n'))
        .unwrap_or(text.len());
    let raw = std::str::from_utf8(&text[.. end])
        .map_err(|_| ExtractError::malformed(PROVIDER, "date", "payment date is not utf-8"))?
        .trim();
    let date = NaiveDate::parse_from_str(raw, format)
        .map_err(|e| ExtractError::malformed(PROVIDER, "date", format!("`{}`: {}", raw, e)))?;
    date.and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc().timestamp())
        .ok_or_else(|| ExtractError::malformed(PROVIDER, "date", "date has no midnight"))
}

/// Number of characters strictly between the first `[` and the first `]`.
fn receipt_id_length(subject: &[u8], marker: &str) -> Result<usize> {
    if locator::find(subject, marker.as_bytes()).is_none() {
        return Err(ExtractError::malformed(
            PROVIDER,
            "subject",
            format!("missing `{}`", marker),
        ));
    }
    let open = locator::find(subject, b"[");
    let close = locator::find(subject, b"]");
    match (open, close) {
        (Some(open), Some(close)) if close > open => {
            let span = SequenceSpan::from_range(open + 1, close, subject.len())?;
            Ok(span.length)
        }
        _ => Err(ExtractError::malformed(
            PROVIDER,
            "receipt_id",
            "subject has no bracketed receipt id",
        )),
    }
}
