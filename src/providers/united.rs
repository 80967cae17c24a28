use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmailInputs, Provider, amount::is_plain_number};
use crate::{
    align::{AlignedWindow, DeferredBody, align_spans},
    config::{TrimRule, UnitedConfig},
    core::{PartialHasher, RawMessage, SequenceSpan},
    error::{ExtractError, Result},
    locator::{find_encoded, strip_soft_breaks},
};

const PROVIDER: Provider = Provider::United;

/// Flight receipt fields. The body is quoted-printable and only travels as
/// two hash-aligned windows plus deferred segments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitedInputs {
    pub email: EmailInputs,
    pub amount: SequenceSpan,
    pub date: SequenceSpan,
    pub airport: SequenceSpan,
    /// Total with soft breaks and markup removed, e.g. `171.785`
    pub amount_text: String,
    pub amount_window: AlignedWindow,
    /// Covers both the date and the destination airport
    pub date_window: AlignedWindow,
    pub deferred: DeferredBody,
}

pub fn extract(
    msg: &RawMessage,
    config: &UnitedConfig,
    key_limbs: usize,
    hasher: &dyn PartialHasher,
) -> Result<UnitedInputs> {
    let email = EmailInputs::build(PROVIDER, msg, config.limits, key_limbs, false)?;
    let body = &msg.body[..];
    if body.len() > config.limits.max_body_len {
        return Err(ExtractError::BufferTooLong {
            provider: PROVIDER,
            field: "body",
            len: body.len(),
            max: config.limits.max_body_len,
        });
    }

    let span = |open: &str, close: &str, from: usize, field: &'static str| {
        anchored_span(body, open, close, from, config.trim, field)
    };
    let (amount, _) = span(&config.total_anchor, &config.currency_anchor, 0, "amount")?;
    let (date, date_postfix) = span(&config.date_anchor, &config.line_anchor, 0, "date")?;
    // the destination opens at the line break after the date's own
    let (airport, _) =
        span(&config.line_anchor, &config.cell_close_anchor, date_postfix + 1, "airport")?;
    debug!(?amount, ?date, ?airport, "located united spans");

    let amount_text = decoded_total(amount.slice(body), config);
    if !is_plain_number(&amount_text) {
        return Err(ExtractError::malformed(
            PROVIDER,
            "amount",
            format!("`{}` is not a number", amount_text),
        ));
    }

    let window = |spans: &[SequenceSpan], field: &'static str| {
        bounded_window(body, spans, hasher, config.max_window_len, field)
    };
    let amount_window = window(&[amount], "amount_window")?;
    let date_window = window(&[date, airport], "date_window")?;
    if amount_window.slice_end > date_window.slice_start {
        return Err(ExtractError::malformed(
            PROVIDER,
            "date",
            format!(
                "date window at {} does not follow amount window ending at {}",
                date_window.slice_start, amount_window.slice_end
            ),
        ));
    }
    let deferred = DeferredBody::between(body, &amount_window, &date_window)?;

    Ok(UnitedInputs {
        email,
        amount,
        date,
        airport,
        amount_text,
        amount_window,
        date_window,
        deferred,
    })
}

/// Span from `open` through the markup closing `close`, both matched across
/// soft line breaks. Also returns the offset of `close`.
fn anchored_span(
    body: &[u8],
    open: &str,
    close: &str,
    from: usize,
    trim: TrimRule,
    field: &'static str,
) -> Result<(SequenceSpan, usize)> {
    let missing = || ExtractError::missing(PROVIDER, field);
    let prefix = find_encoded(body, open.as_bytes(), from).ok_or_else(missing)?;
    let postfix = find_encoded(body, close.as_bytes(), prefix).ok_or_else(missing)?;
    let end = trim.span_end(body, postfix);
    let span = SequenceSpan::from_range(prefix, end, body.len())
        .map_err(|_| ExtractError::malformed(PROVIDER, field, "span runs past the body"))?;
    Ok((span, postfix))
}

fn bounded_window(
    body: &[u8],
    spans: &[SequenceSpan],
    hasher: &dyn PartialHasher,
    max: usize,
    field: &'static str,
) -> Result<AlignedWindow> {
    let window = align_spans(body, spans, hasher)?;
    if window.slice_end - window.slice_start > max {
        return Err(ExtractError::BufferTooLong {
            provider: PROVIDER,
            field,
            len: window.slice_end - window.slice_start,
            max,
        });
    }
    Ok(window)
}

/// Text between the total and currency anchors with markup dropped.
fn decoded_total(encoded: &[u8], config: &UnitedConfig) -> String {
    let decoded = strip_soft_breaks(encoded);
    let mut text = String::new();
    let mut in_tag = false;
    for ch in String::from_utf8_lossy(&decoded).chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    let start = text.find(&config.total_anchor).map_or(0, |pos| pos + config.total_anchor.len());
    let end = text[start ..]
        .find(&config.currency_anchor)
        .map_or(text.len(), |pos| start + pos);
    text[start .. end].trim().to_string()
}
