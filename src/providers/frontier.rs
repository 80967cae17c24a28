use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Amount, EmailInputs, Provider, find_currency};
use crate::{
    config::FrontierConfig,
    core::{RawMessage, SequenceSpan},
    error::{ExtractError, Result},
    locator::{find, find_from, rfind_at_or_before},
};

const PROVIDER: Provider = Provider::Frontier;

/// Offsets of the `Grand Total` row, in circuit argument order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseTotalIndices {
    pub row_start: usize,
    pub td_label_len: usize,
    pub td_amount_len: usize,
    pub amount_len: usize,
}

impl PurchaseTotalIndices {
    pub fn to_array(&self) -> [usize; 4] {
        [self.row_start, self.td_label_len, self.td_amount_len, self.amount_len]
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierInputs {
    pub email: EmailInputs,
    pub purchase_total: PurchaseTotalIndices,
    pub amount: Amount,
}

pub fn extract(
    msg: &RawMessage,
    config: &FrontierConfig,
    key_limbs: usize,
) -> Result<FrontierInputs> {
    let email = EmailInputs::build(PROVIDER, msg, config.limits, key_limbs, true)?;
    let (purchase_total, amount_span) = purchase_total_indices(&msg.body, config)?;

    let text = amount_span.slice(&msg.body);
    let mut amount = find_currency(text).ok_or_else(|| {
        ExtractError::malformed(
            PROVIDER,
            "amount",
            format!("`{}` is not a dollar amount", String::from_utf8_lossy(text)),
        )
    })?;
    amount.span.index += amount_span.index;
    debug!(indices = ?purchase_total.to_array(), text = %amount.text, "located grand total row");

    Ok(FrontierInputs {
        email,
        purchase_total,
        amount,
    })
}

/// Walks the nested table row around the total anchor.
///
/// Soft line breaks are not expected inside this row.
pub fn purchase_total_indices(
    body: &[u8],
    config: &FrontierConfig,
) -> Result<(PurchaseTotalIndices, SequenceSpan)> {
    let missing = |field| ExtractError::missing(PROVIDER, field);
    let malformed = |field, reason: &str| ExtractError::malformed(PROVIDER, field, reason);

    let grand_total =
        find(body, config.total_anchor.as_bytes()).ok_or_else(|| missing("grand_total"))?;
    let td_label_close = grand_total
        .checked_sub(1)
        .ok_or_else(|| malformed("grand_total", "anchor opens the body"))?;
    let row_start = rfind_at_or_before(body, b"<tr>", td_label_close)
        .ok_or_else(|| missing("grand_total_row"))?;
    let td_label_open =
        find_from(body, b"<td", row_start).ok_or_else(|| missing("grand_total_label"))?;
    let td_label_len = td_label_close
        .checked_sub(td_label_open)
        .ok_or_else(|| malformed("grand_total_label", "label cell opens after the anchor"))?;

    let cell = |needle: &[u8], from: usize| {
        find_from(body, needle, from).ok_or_else(|| missing("grand_total_cell"))
    };
    let td_amount_start = cell(b"<td", grand_total)?;
    let td_amount_end = cell(b">", td_amount_start)?;
    let td_amount_close = cell(b"</td>", td_amount_end)?;

    let padding = config.offsets.amount_padding;
    let amount = SequenceSpan::from_range(td_amount_end + padding, td_amount_close, body.len())
        .map_err(|_| malformed("amount", "amount cell is too short"))?;

    Ok((
        PurchaseTotalIndices {
            row_start,
            td_label_len,
            td_amount_len: td_amount_end - td_amount_start,
            amount_len: amount.length,
        },
        amount,
    ))
}
