use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Amount, EmailInputs, Provider, find_currency};
use crate::{
    config::AmericanAirlinesConfig,
    core::{RawMessage, SequenceSpan},
    error::{ExtractError, Result},
    locator::{find, find_from, rfind_at_or_before},
};

const PROVIDER: Provider = Provider::AmericanAirlines;

/// Offsets of the `Total cost` table row, in circuit argument order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalCostIndices {
    pub tr_start: usize,
    pub td_label_length: usize,
    pub span_label_length: usize,
    pub td_cost_length: usize,
    pub amount_length: usize,
}

impl TotalCostIndices {
    pub fn to_array(&self) -> [usize; 5] {
        [
            self.tr_start,
            self.td_label_length,
            self.span_label_length,
            self.td_cost_length,
            self.amount_length,
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmericanAirlinesInputs {
    pub email: EmailInputs,
    pub total_cost: TotalCostIndices,
    pub amount: Amount,
}

pub fn extract(
    msg: &RawMessage,
    config: &AmericanAirlinesConfig,
    key_limbs: usize,
) -> Result<AmericanAirlinesInputs> {
    let email = EmailInputs::build(PROVIDER, msg, config.limits, key_limbs, true)?;
    let (total_cost, amount_span) = total_cost_indices(&msg.body, config)?;

    let text = amount_span.slice(&msg.body);
    let mut amount = find_currency(text).ok_or_else(|| {
        ExtractError::malformed(
            PROVIDER,
            "amount",
            format!("`{}` is not a dollar amount", String::from_utf8_lossy(text)),
        )
    })?;
    amount.span.index += amount_span.index;
    debug!(indices = ?total_cost.to_array(), text = %amount.text, "located total cost row");

    Ok(AmericanAirlinesInputs {
        email,
        total_cost,
        amount,
    })
}

fn distance(field: &'static str, from: usize, to: usize) -> Result<usize> {
    to.checked_sub(from).ok_or_else(|| {
        ExtractError::malformed(PROVIDER, field, format!("offset {} precedes {}", to, from))
    })
}

/// Walks the row markup around the total anchor.
///
/// Returns the indices and the span of the amount text inside the cost cell.
pub fn total_cost_indices(
    body: &[u8],
    config: &AmericanAirlinesConfig,
) -> Result<(TotalCostIndices, SequenceSpan)> {
    let offsets = config.offsets;
    let missing = |field| ExtractError::missing(PROVIDER, field);

    let total = find(body, config.total_anchor.as_bytes()).ok_or_else(|| missing("total_cost"))?;
    let tr_start =
        rfind_at_or_before(body, b"<tr>", total).ok_or_else(|| missing("total_cost_row"))?;
    let span_start =
        rfind_at_or_before(body, b"<span", total).ok_or_else(|| missing("total_cost_label"))?;

    let td_label_end = distance("total_cost_label", offsets.td_label_end_back, span_start)?;
    let td_label_start = tr_start + offsets.tr_prefix_len;
    let td_label_length = distance("total_cost_label", td_label_start, td_label_end)?;
    let span_label_length = distance(
        "total_cost_label",
        span_start,
        distance("total_cost_label", offsets.span_label_end_back, total)?,
    )?;

    let cell = |needle: &[u8], from: usize| {
        find_from(body, needle, from).ok_or_else(|| missing("total_cost_cell"))
    };
    let td_cost_start = cell(b"<td", total)?;
    let td_cost_close = cell(b">", td_cost_start)?;
    let td_cost_end = cell(b"</td>", td_cost_close)?;
    let amount = SequenceSpan::from_range(td_cost_close + 1, td_cost_end, body.len())?;

    Ok((
        TotalCostIndices {
            tr_start,
            td_label_length,
            span_label_length,
            td_cost_length: td_cost_close - td_cost_start,
            amount_length: amount.length,
        },
        amount,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::fixtures;

    const BODY: &[u8] = b"<table>\r\n<tr>\r\n <td class=\"label\">\r\n\
<span class=\"strong\">Total cost</span></td>\r\n <td class=\"amount\">$1,234.56</td>\r\n\
</tr>\r\n</table>\r\n";

    fn message(body: &[u8]) -> RawMessage {
        fixtures::message(
            fixtures::header(
                "Your trip confirmation",
                "American Airlines <no-reply@info.email.aa.com>",
            ),
            body.to_vec(),
        )
    }

    #[test]
    fn test_total_cost_indices() {
        let config = AmericanAirlinesConfig::default();
        let (indices, amount) = total_cost_indices(BODY, &config).unwrap();
        assert_eq!(indices.to_array(), [9, 17, 20, 18, 9]);
        assert_eq!(amount.slice(BODY), b"$1,234.56");

        // label cell runs from `<td` up to its `>`
        let td = indices.tr_start + 7;
        assert_eq!(&BODY[td .. td + indices.td_label_length + 1], b"<td class=\"label\">");
    }

    #[test]
    fn test_extract_amount() {
        let inputs = extract(&message(BODY), &AmericanAirlinesConfig::default(), 18).unwrap();
        assert_eq!(inputs.amount.minor_units, 123_456);
        assert_eq!(inputs.amount.span.slice(BODY), b"$1,234.56");
    }

    #[test]
    fn test_non_currency_amount() {
        let body = String::from_utf8_lossy(BODY).replace("$1,234.56", "TBD").into_bytes();
        let err = extract(&message(&body), &AmericanAirlinesConfig::default(), 18).unwrap_err();
        assert!(matches!(err, ExtractError::MalformedField { field: "amount", .. }));
    }

    #[test]
    fn test_missing_anchor_or_row() {
        let config = AmericanAirlinesConfig::default();
        assert_eq!(
            total_cost_indices(b"<tr><td>Subtotal</td></tr>", &config).unwrap_err(),
            ExtractError::missing(Provider::AmericanAirlines, "total_cost")
        );
        assert_eq!(
            total_cost_indices(b"<span>Total cost</span>", &config).unwrap_err(),
            ExtractError::missing(Provider::AmericanAirlines, "total_cost_row")
        );
    }
}
