//! Per-window volume estimation from a parsed BAI reference.
//!
//! The estimator converts one reference's index into fixed-length windows
//! annotated with estimated volume `V`, a relative, unitless measure of
//! the uncompressed BGZF bytes attributable to each window. Volumes are
//! only meaningful in comparison with each other; they are not byte
//! counts.
//!
//! # Method
//!
//! 1. Collect the ordered, unique list of virtual offsets appearing in
//!    the (patched) linear index and in the chunks of all coverage bins.
//! 2. For each adjacent pair, the segment volume is the difference of the
//!    notional uncompressed stream positions
//!    `bytes(v) = (coffset << 16) + uoffset`. The shift keeps ordering
//!    and lets the compressed-block delta dominate while the low bits
//!    still carry within-block deltas.
//! 3. Attribute each segment to the 16 kb tile owning its start, found
//!    through the linear index; a segment spanning several tiles is
//!    distributed in equal integer shares across them (remainder to the
//!    earliest tiles).
//! 4. Emit one window per tile, covering `[t * 16384, min((t + 1) *
//!    16384, length_bp))`.
//!
//! Windows with no contributing segments have volume 0. A reference with
//! zero coverage bins yields zero windows; the caller is responsible for
//! announcing the contig anyway.

use crate::formats::index::{ReferenceIndex, VirtualOffset};

/// Window length in bp: the BAI linear-index tile size, the fundamental
/// resolution of the volume signal.
pub const WINDOW_BP: u64 = 16_384;

/// Scale factor aligning compressed-block offsets with within-block
/// offsets in `bytes(v)`.
const UNCOMPRESSED_SHIFT: u32 = 16;

/// A fixed-length window with estimated volume.
///
/// `start` is a multiple of [`WINDOW_BP`]; `end - start == WINDOW_BP`
/// except for the terminal window of a contig, which may be shorter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Start position (0-based, inclusive).
    pub start: u64,
    /// End position (exclusive).
    pub end: u64,
    /// Estimated volume in `V`.
    pub volume: u64,
}

/// Notional uncompressed stream position of a virtual offset.
fn uncompressed_position(v: VirtualOffset) -> u64 {
    (v.compressed() << UNCOMPRESSED_SHIFT) + v.uncompressed() as u64
}

/// Tile owning a stream position: the tile before the first linear-index
/// entry beyond `v`, or tile 0 when `v` precedes every entry.
///
/// The linear index must already be patched; zero entries (tiles before
/// the first alignment) never own a segment.
fn owner_tile(intervals: &[VirtualOffset], v: u64) -> usize {
    let t = intervals.partition_point(|entry| entry.is_zero() || entry.as_raw() <= v);
    if t == intervals.len() {
        intervals.len().saturating_sub(1)
    } else {
        t.saturating_sub(1)
    }
}

/// Estimate window volumes for one reference.
///
/// Returns windows covering `[0, length_bp)` in ascending order, or an
/// empty vector when the reference carries no coverage bins or the contig
/// has zero length.
pub fn estimate_windows(reference: &ReferenceIndex, length_bp: u64) -> Vec<Window> {
    if reference.is_empty() || length_bp == 0 {
        return Vec::new();
    }

    let n_tiles = length_bp.div_ceil(WINDOW_BP) as usize;
    let mut volumes = vec![0u64; n_tiles];

    // An all-zero linear index cannot place segments; everything then
    // accrues to tile 0.
    let intervals: &[VirtualOffset] = if reference.intervals.iter().any(|v| !v.is_zero()) {
        &reference.intervals
    } else {
        &[]
    };

    // Ordered, unique virtual offsets from the linear index and all
    // coverage chunks.
    let mut offsets: Vec<u64> = reference
        .intervals
        .iter()
        .filter(|v| !v.is_zero())
        .map(|v| v.as_raw())
        .chain(reference.bins.iter().flat_map(|bin| {
            bin.chunks
                .iter()
                .flat_map(|chunk| [chunk.start.as_raw(), chunk.end.as_raw()])
        }))
        .collect();
    offsets.sort_unstable();
    offsets.dedup();

    for pair in offsets.windows(2) {
        let (lo, hi) = (VirtualOffset::from_raw(pair[0]), VirtualOffset::from_raw(pair[1]));
        let segment = uncompressed_position(hi) - uncompressed_position(lo);
        if segment == 0 {
            continue;
        }

        let first = owner_tile(intervals, pair[0]).min(n_tiles - 1);
        let last = owner_tile(intervals, pair[1] - 1).min(n_tiles - 1).max(first);

        let span = (last - first + 1) as u64;
        let share = segment / span;
        let remainder = segment % span;
        for (i, volume) in volumes[first..=last].iter_mut().enumerate() {
            *volume += share + u64::from((i as u64) < remainder);
        }
    }

    volumes
        .into_iter()
        .enumerate()
        .map(|(t, volume)| {
            let start = t as u64 * WINDOW_BP;
            Window {
                start,
                end: (start + WINDOW_BP).min(length_bp),
                volume,
            }
        })
        .collect()
}

/// Windows covering `[0, length_bp)` with zero volume, for contigs the
/// index carries no data for.
pub fn empty_windows(length_bp: u64) -> Vec<Window> {
    let n_tiles = length_bp.div_ceil(WINDOW_BP) as usize;
    (0..n_tiles)
        .map(|t| {
            let start = t as u64 * WINDOW_BP;
            Window {
                start,
                end: (start + WINDOW_BP).min(length_bp),
                volume: 0,
            }
        })
        .collect()
}
