//! Target intersection for window streams.
//!
//! With targets supplied, each window is split at target boundaries.
//! Pieces inside a target carry a proportional share of the window's
//! volume and the originating target id; pieces outside keep their
//! position with volume 0, so the partitioner retains positional
//! continuity. Without targets this stage is the identity.

use crate::formats::bed::TargetSpan;
use crate::volume::Window;

/// A window piece after target intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskedWindow {
    /// Start position (0-based, inclusive).
    pub start: u64,
    /// End position (exclusive).
    pub end: u64,
    /// Estimated volume of this piece.
    pub volume: u64,
    /// Id of the target this piece falls in, if any.
    pub target: Option<usize>,
}

impl MaskedWindow {
    /// Length of the piece in bp.
    pub fn length(&self) -> u64 {
        self.end - self.start
    }
}

/// Pass windows through unchanged (no targets).
pub fn unmasked(windows: &[Window]) -> Vec<MaskedWindow> {
    windows
        .iter()
        .map(|w| MaskedWindow {
            start: w.start,
            end: w.end,
            volume: w.volume,
            target: None,
        })
        .collect()
}

/// Proportional volume of a `piece_len`-bp slice of a window, rounded up
/// so that any overlap with data keeps at least one unit.
fn scaled_volume(volume: u64, piece_len: u64, window_len: u64) -> u64 {
    if window_len == 0 {
        return 0;
    }
    let num = piece_len as u128 * volume as u128;
    ((num + window_len as u128 - 1) / window_len as u128) as u64
}

/// Intersect a contig's windows with its merged target spans.
///
/// `spans` must be sorted by start and disjoint (as produced by
/// [`crate::formats::bed::TargetSet`]). Output pieces tile the same
/// coordinates as the input windows, in order.
pub fn apply_targets(windows: &[Window], spans: &[TargetSpan]) -> Vec<MaskedWindow> {
    let mut out = Vec::with_capacity(windows.len());
    let mut next_span = 0;

    for window in windows {
        while next_span < spans.len() && spans[next_span].end <= window.start {
            next_span += 1;
        }

        let mut cursor = window.start;
        let mut si = next_span;
        while si < spans.len() && spans[si].start < window.end {
            let span = &spans[si];
            let lo = span.start.max(window.start);
            let hi = span.end.min(window.end);

            if lo > cursor {
                out.push(MaskedWindow {
                    start: cursor,
                    end: lo,
                    volume: 0,
                    target: None,
                });
            }
            out.push(MaskedWindow {
                start: lo,
                end: hi,
                volume: scaled_volume(window.volume, hi - lo, window.end - window.start),
                target: Some(span.id),
            });
            cursor = hi;

            if span.end > window.end {
                break;
            }
            si += 1;
        }

        if cursor < window.end {
            out.push(MaskedWindow {
                start: cursor,
                end: window.end,
                volume: 0,
                target: None,
            });
        }
    }

    out
}
