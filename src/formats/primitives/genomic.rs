//! Genomic coordinate types and operations.
//!
//! # Coordinate System
//!
//! All genomic intervals use **0-based, half-open** coordinates `[start, end)`:
//! - Start position is inclusive (0-based)
//! - End position is exclusive
//! - Length = end - start
//!
//! This matches the BED format and is standard in bioinformatics.

use crate::error::{IndexToolsError, Result};
use std::fmt;

/// A genomic interval with contig name and coordinates.
///
/// Coordinates are **0-based, half-open** `[start, end)`.
///
/// # Invariants
///
/// - `start < end` (enforced by constructor)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GenomicInterval {
    /// Chromosome or contig name.
    pub contig: String,

    /// Start position (0-based, inclusive).
    pub start: u64,

    /// End position (0-based, exclusive).
    pub end: u64,
}

impl GenomicInterval {
    /// Creates a new genomic interval.
    ///
    /// # Errors
    ///
    /// Returns [`IndexToolsError::InvalidFormat`] if `start >= end`.
    pub fn new(contig: String, start: u64, end: u64) -> Result<Self> {
        if start >= end {
            return Err(IndexToolsError::InvalidFormat {
                format: "interval",
                msg: format!("empty or inverted interval {}:{}-{}", contig, start, end),
            });
        }

        Ok(GenomicInterval { contig, start, end })
    }

    /// Returns the length of this interval in base pairs.
    #[inline]
    pub fn length(&self) -> u64 {
        self.end - self.start
    }

    /// Checks whether this interval overlaps another interval.
    ///
    /// Two intervals overlap if they share at least one base position.
    /// Different contigs never overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.contig == other.contig && self.start < other.end && other.start < self.end
    }

    /// Checks whether this interval completely contains another interval.
    pub fn contains(&self, other: &Self) -> bool {
        self.contig == other.contig && self.start <= other.start && self.end >= other.end
    }

    /// Number of bases shared with `[start, end)` on the same contig.
    pub fn overlap_len(&self, start: u64, end: u64) -> u64 {
        let lo = self.start.max(start);
        let hi = self.end.min(end);
        hi.saturating_sub(lo)
    }
}

impl fmt::Display for GenomicInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.contig, self.start, self.end)
    }
}
