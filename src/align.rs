//! SHA-256 block alignment of body spans.
//!
//! A circuit that verifies the body hash incrementally receives the chaining
//! state of every whole block before a window, then only the window bytes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    capsule::CapsuleSet,
    core::{HashAlignedSpan, PartialHashState, PartialHasher, SequenceSpan},
    error::{ExtractError, Result},
    hash::sha256::{ceil_block, floor_block},
};

/// Smallest block-aligned `[start, end)` covering every span.
pub fn covering_window(spans: &[SequenceSpan], body_len: usize) -> Result<(usize, usize)> {
    let first = spans
        .iter()
        .map(|span| span.index)
        .min()
        .ok_or_else(|| ExtractError::Invariant("no spans to align".to_string()))?;
    let last = spans.iter().map(SequenceSpan::end).max().unwrap_or(first);
    if last > body_len {
        return Err(ExtractError::Invariant(format!(
            "span ends at {} past body of {} bytes",
            last, body_len
        )));
    }
    Ok((floor_block(first), ceil_block(last)))
}

/// One hash-aligned slice of a body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedWindow {
    pub slice_start: usize,
    pub slice_end: usize,
    pub spans: Vec<HashAlignedSpan>,
    /// State after every block before `slice_start`
    pub partial_hash: PartialHashState,
    /// `body[slice_start .. min(slice_end, body.len())]`
    pub bytes: Vec<u8>,
}

impl AlignedWindow {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Span offsets relative to the window start, in input order.
    pub fn local_spans(&self) -> Vec<SequenceSpan> {
        self.spans.iter().map(HashAlignedSpan::local).collect()
    }
}

/// Aligns `spans` to a common window and hashes the blocks before it.
///
/// A window starting at offset zero uses the identity state and never calls
/// `hasher`.
pub fn align_spans(
    body: &[u8],
    spans: &[SequenceSpan],
    hasher: &dyn PartialHasher,
) -> Result<AlignedWindow> {
    let (slice_start, slice_end) = covering_window(spans, body.len())?;
    let aligned = spans
        .iter()
        .map(|span| HashAlignedSpan::new(*span, slice_start, slice_end))
        .collect::<Result<Vec<_>>>()?;

    let partial_hash = if slice_start == 0 {
        PartialHashState::identity()
    } else {
        hasher.partial_state(&body[.. slice_start])?
    };
    let bytes = body[slice_start .. slice_end.min(body.len())].to_vec();
    debug!(slice_start, slice_end, len = bytes.len(), "aligned window");

    Ok(AlignedWindow {
        slice_start,
        slice_end,
        spans: aligned,
        partial_hash,
        bytes,
    })
}

/// Body bytes outside two consecutive windows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeferredBody {
    /// From the end of the first window to the start of the second
    pub between: Vec<u8>,
    /// Everything after the second window
    pub remaining: Vec<u8>,
    pub actual_length: usize,
}

impl DeferredBody {
    pub fn between(body: &[u8], first: &AlignedWindow, second: &AlignedWindow) -> Result<Self> {
        if first.slice_end > second.slice_start {
            return Err(ExtractError::Invariant(format!(
                "window [{}, {}) overlaps or follows window [{}, {})",
                first.slice_start, first.slice_end, second.slice_start, second.slice_end
            )));
        }
        let len = body.len();
        let between = body[first.slice_end.min(len) .. second.slice_start.min(len)].to_vec();
        let remaining = body[second.slice_end.min(len) ..].to_vec();
        Ok(Self {
            between,
            remaining,
            actual_length: len,
        })
    }

    /// Capsule sets in delivery order: the remainder, then the gap.
    pub fn capsules(&self, chunk_size: usize) -> Result<Vec<CapsuleSet>> {
        Ok(vec![
            CapsuleSet::chunk(&self.remaining, chunk_size)?,
            CapsuleSet::chunk(&self.between, chunk_size)?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{backend::mock::CountingBackend, hash::sha256};

    fn body(len: usize) -> Vec<u8> {
        (0 .. len).map(|i| b'a' + (i % 26) as u8).collect()
    }

    fn span(index: usize, length: usize) -> SequenceSpan {
        SequenceSpan { index, length }
    }

    #[test]
    fn test_window_bounds() {
        let spans = [
            SequenceSpan { index: 70, length: 10 },
            SequenceSpan { index: 130, length: 2 },
        ];
        assert_eq!(covering_window(&spans, 200).unwrap(), (64, 192));
        // ending exactly on a boundary adds no block
        let exact = [SequenceSpan { index: 64, length: 64 }];
        assert_eq!(covering_window(&exact, 200).unwrap(), (64, 128));
        assert!(covering_window(&[], 200).is_err());
        assert!(covering_window(&spans, 100).is_err());
    }

    #[test]
    fn test_zero_start_skips_partial_hash() {
        let backend = CountingBackend::new().unwrap();
        let body = body(300);
        let window = align_spans(&body, &[span(10, 5)], &backend).unwrap();

        assert_eq!(backend.partial_calls(), 0);
        assert!(window.partial_hash.is_identity());
        assert_eq!(window.bytes, body[.. 64].to_vec());
    }

    #[test]
    fn test_partial_hash_resumes_to_full_digest() {
        let backend = CountingBackend::new().unwrap();
        let body = body(300);
        let window = align_spans(&body, &[span(200, 90)], &backend).unwrap();

        assert_eq!(backend.partial_calls(), 1);
        assert_eq!(window.slice_start, 192);
        assert_eq!(window.slice_end, 320);
        // window clipped to the body
        assert_eq!(window.len(), 108);
        assert_eq!(window.local_spans(), vec![SequenceSpan { index: 8, length: 90 }]);
        assert_eq!(window.partial_hash.finish(&body[192 ..]), sha256::hash(&body));
    }

    #[test]
    fn test_deferred_segments() {
        let backend = CountingBackend::new().unwrap();
        let body = body(1000);
        let first = align_spans(&body, &[span(10, 5)], &backend).unwrap();
        let second = align_spans(&body, &[span(500, 20)], &backend).unwrap();

        let deferred = DeferredBody::between(&body, &first, &second).unwrap();
        assert_eq!(deferred.between, body[64 .. 448].to_vec());
        assert_eq!(deferred.remaining, body[576 ..].to_vec());
        assert_eq!(deferred.actual_length, 1000);

        let sets = deferred.capsules(256).unwrap();
        assert_eq!(sets[0].reassemble().unwrap(), deferred.remaining);
        assert_eq!(sets[1].reassemble().unwrap(), deferred.between);

        assert!(DeferredBody::between(&body, &second, &first).is_err());
    }

    proptest! {
        #[test]
        fn prop_window_is_aligned_and_covering(
            len in 1usize..2000,
            index in 0usize..2000,
            length in 0usize..300,
        ) {
            let index = index % len;
            let length = length.min(len - index);
            let span = SequenceSpan { index, length };
            let (start, end) = covering_window(&[span], len).unwrap();

            prop_assert_eq!(start % 64, 0);
            prop_assert_eq!(end % 64, 0);
            prop_assert!(start <= index);
            prop_assert!(end >= index + length);
            prop_assert!(index - start < 64);
            prop_assert!(end - (index + length) < 64);
        }
    }
}
