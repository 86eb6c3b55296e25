//! BAI (BAM Index) format support.
//!
//! This module parses BAI files, the binary companion index of BAM
//! alignment files. indextools never touches the BAM data path itself; the
//! index alone carries enough signal to estimate per-region data volume.
//!
//! # Format Specification
//!
//! BAI files are binary, little-endian throughout:
//!
//! ## Header
//! - Magic: "BAI\1" (4 bytes)
//! - n_ref: Number of reference sequences (int32)
//!
//! ## Index Data (per reference)
//! - n_bin (int32), then per bin:
//!   - bin id (uint32)
//!   - n_chunk (int32)
//!   - n_chunk pairs of (chunk_beg, chunk_end) virtual offsets (uint64)
//! - n_intv (int32), then n_intv linear-index virtual offsets (uint64)
//!
//! ## Trailer (optional)
//! - n_no_coor: count of unplaced reads (uint64)
//!
//! # Binning Scheme
//!
//! UCSC binning over 512 Mbp in 6 levels (37,450 coverage bins). Bin
//! 37450 is a pseudo-bin carrying per-reference metadata: two chunk-shaped
//! entries holding `(reference_start, reference_end)` virtual offsets and
//! `(mapped, unmapped)` read counts. It is parsed into
//! [`ReferenceMetadata`] and excluded from the coverage bins.
//!
//! # Virtual File Offsets
//!
//! BGZF virtual offsets (64-bit):
//! - High 48 bits: compressed file offset of a BGZF block (coffset)
//! - Low 16 bits: uncompressed offset within the block (uoffset)
//!
//! # Linear-Index Patching
//!
//! Some writers emit zero entries inside an otherwise populated linear
//! index. Before an index leaves this module, every zero entry with a
//! non-zero predecessor is forward-filled from that predecessor; patched
//! entries are counted and reported as a warning.
//!
//! # Errors
//!
//! Every structural violation (short read, bad magic, negative count,
//! inverted chunk, bin count above the UCSC maximum) raises
//! [`IndexToolsError::MalformedIndex`] naming the byte offset at which the
//! violation was detected.

use crate::error::{IndexToolsError, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// BAI file format magic string
const BAI_MAGIC: &[u8; 4] = b"BAI\x01";

/// Pseudo-bin id carrying per-reference metadata
pub const METADATA_BIN_ID: u32 = 37450;

/// Number of bins in the UCSC scheme, including the metadata pseudo-bin
const MAX_BIN_COUNT: i32 = 37451;

/// A virtual file offset into a BGZF-compressed stream.
///
/// The raw value packs the compressed block start into the high 48 bits
/// and the within-block uncompressed offset into the low 16 bits, so raw
/// values order the same way as stream positions.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    /// Wrap a raw 64-bit virtual offset.
    pub fn from_raw(raw: u64) -> Self {
        VirtualOffset(raw)
    }

    /// The raw 64-bit value.
    pub fn as_raw(&self) -> u64 {
        self.0
    }

    /// Compressed file offset of the containing BGZF block (high 48 bits).
    pub fn compressed(&self) -> u64 {
        self.0 >> 16
    }

    /// Uncompressed offset within the block (low 16 bits).
    pub fn uncompressed(&self) -> u16 {
        (self.0 & 0xffff) as u16
    }

    /// Whether this is the all-zero offset (used by writers for "absent").
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.compressed(), self.uncompressed())
    }
}

/// A chunk of the alignment stream, delimited by two virtual offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Virtual offset of the first byte of the chunk.
    pub start: VirtualOffset,
    /// Virtual offset one past the last byte of the chunk.
    pub end: VirtualOffset,
}

impl Chunk {
    /// Create a new chunk.
    pub fn new(start: VirtualOffset, end: VirtualOffset) -> Self {
        Chunk { start, end }
    }
}

/// A coverage bin in the hierarchical binning index.
#[derive(Debug, Clone)]
pub struct Bin {
    /// Bin number (0-37449)
    pub id: u32,
    /// Chunks of alignment data assigned to this bin
    pub chunks: Vec<Chunk>,
}

/// Per-reference metadata from pseudo-bin 37450.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceMetadata {
    /// Virtual offset of the first alignment on the reference.
    pub start: VirtualOffset,
    /// Virtual offset past the last alignment on the reference.
    pub end: VirtualOffset,
    /// Number of mapped reads on the reference.
    pub mapped: u64,
    /// Number of unmapped reads placed on the reference.
    pub unmapped: u64,
}

/// Index data for a single reference sequence, in BAI slot order.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    /// Coverage bins (metadata pseudo-bin excluded).
    pub bins: Vec<Bin>,
    /// Linear index: one virtual offset per 16 kb tile, forward-filled.
    pub intervals: Vec<VirtualOffset>,
    /// Metadata from pseudo-bin 37450, when present.
    pub metadata: Option<ReferenceMetadata>,
}

impl ReferenceIndex {
    /// Whether this reference slot carries no coverage data at all.
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

/// A parsed BAI index.
#[derive(Debug, Clone)]
pub struct BaiIndex {
    /// One entry per reference, in BAI slot order.
    pub references: Vec<ReferenceIndex>,
    /// Count of unplaced reads from the optional trailer.
    pub unplaced: Option<u64>,
}

impl BaiIndex {
    /// Load a BAI index from a file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        Self::from_reader(&mut reader)
    }

    /// Parse a BAI index from a byte stream positioned at its start.
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut parser = BaiParser::new(reader);
        parser.parse()
    }
}

/// Forward-fill zero entries of a linear index from their predecessor.
///
/// Entry `i` is the smallest virtual offset of any alignment starting in
/// tile `i`; a zero entry between populated tiles is a known writer bug.
/// Leading zeros (tiles before the first alignment) are left untouched.
///
/// Returns the number of entries patched.
pub fn patch_linear_index(intervals: &mut [VirtualOffset]) -> usize {
    let mut patched = 0;
    let mut prev = VirtualOffset::default();
    for entry in intervals.iter_mut() {
        if entry.is_zero() {
            if !prev.is_zero() {
                *entry = prev;
                patched += 1;
            }
        } else {
            prev = *entry;
        }
    }
    patched
}

/// Streaming BAI parser that tracks the byte offset of every read so
/// structural violations can name where they were found.
struct BaiParser<'a, R> {
    reader: &'a mut R,
    offset: u64,
}

impl<'a, R: Read> BaiParser<'a, R> {
    fn new(reader: &'a mut R) -> Self {
        BaiParser { reader, offset: 0 }
    }

    fn malformed(&self, at: u64, msg: impl Into<String>) -> IndexToolsError {
        IndexToolsError::MalformedIndex {
            offset: at,
            msg: msg.into(),
        }
    }

    /// Read exactly `buf.len()` bytes, converting a short read into
    /// `MalformedIndex` at the current offset.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        match self.reader.read_exact(buf) {
            Ok(()) => {
                self.offset += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(self.malformed(self.offset, "unexpected end of file"))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    fn parse(&mut self) -> Result<BaiIndex> {
        let mut magic = [0u8; 4];
        self.read_exact(&mut magic)?;
        if &magic != BAI_MAGIC {
            return Err(self.malformed(
                0,
                format!("invalid magic: expected {:?}, got {:?}", BAI_MAGIC, magic),
            ));
        }

        let at = self.offset;
        let n_ref = self.read_i32()?;
        if n_ref < 0 {
            return Err(self.malformed(at, format!("negative reference count: {}", n_ref)));
        }

        let mut references = Vec::with_capacity(n_ref as usize);
        for ref_id in 0..n_ref as usize {
            references.push(self.parse_reference(ref_id)?);
        }

        let unplaced = self.read_trailer()?;

        Ok(BaiIndex {
            references,
            unplaced,
        })
    }

    fn parse_reference(&mut self, ref_id: usize) -> Result<ReferenceIndex> {
        let at = self.offset;
        let n_bin = self.read_i32()?;
        if n_bin < 0 {
            return Err(self.malformed(
                at,
                format!("negative bin count for reference {}: {}", ref_id, n_bin),
            ));
        }
        if n_bin > MAX_BIN_COUNT {
            return Err(self.malformed(
                at,
                format!(
                    "bin count {} for reference {} exceeds the UCSC maximum of {}",
                    n_bin, ref_id, MAX_BIN_COUNT
                ),
            ));
        }

        let mut bins = Vec::new();
        let mut metadata = None;
        for _ in 0..n_bin {
            let at = self.offset;
            let bin_id = self.read_u32()?;
            if bin_id > METADATA_BIN_ID {
                return Err(self.malformed(at, format!("bin id {} out of range", bin_id)));
            }

            if bin_id == METADATA_BIN_ID {
                metadata = Some(self.parse_metadata_bin(ref_id)?);
            } else {
                bins.push(self.parse_coverage_bin(bin_id)?);
            }
        }

        let at = self.offset;
        let n_intv = self.read_i32()?;
        if n_intv < 0 {
            return Err(self.malformed(
                at,
                format!(
                    "negative linear-index length for reference {}: {}",
                    ref_id, n_intv
                ),
            ));
        }

        let mut intervals = Vec::with_capacity(n_intv as usize);
        for _ in 0..n_intv {
            intervals.push(VirtualOffset::from_raw(self.read_u64()?));
        }

        let patched = patch_linear_index(&mut intervals);
        if patched > 0 {
            log::warn!(
                "patched {} zero linear-index entries in reference {}",
                patched,
                ref_id
            );
        }

        Ok(ReferenceIndex {
            bins,
            intervals,
            metadata,
        })
    }

    fn parse_coverage_bin(&mut self, bin_id: u32) -> Result<Bin> {
        let at = self.offset;
        let n_chunk = self.read_i32()?;
        if n_chunk < 0 {
            return Err(self.malformed(
                at,
                format!("negative chunk count in bin {}: {}", bin_id, n_chunk),
            ));
        }

        let mut chunks = Vec::with_capacity(n_chunk as usize);
        for _ in 0..n_chunk {
            let at = self.offset;
            let beg = VirtualOffset::from_raw(self.read_u64()?);
            let end = VirtualOffset::from_raw(self.read_u64()?);
            if end <= beg {
                return Err(self.malformed(
                    at,
                    format!(
                        "chunk end {:?} not beyond chunk start {:?} in bin {}",
                        end, beg, bin_id
                    ),
                ));
            }
            chunks.push(Chunk::new(beg, end));
        }

        Ok(Bin { id: bin_id, chunks })
    }

    /// The metadata pseudo-bin carries exactly two chunk-shaped entries:
    /// the reference's virtual-offset span, then its read counts.
    fn parse_metadata_bin(&mut self, ref_id: usize) -> Result<ReferenceMetadata> {
        let at = self.offset;
        let n_chunk = self.read_i32()?;
        if n_chunk != 2 {
            return Err(self.malformed(
                at,
                format!(
                    "metadata bin of reference {} has {} chunks, expected 2",
                    ref_id, n_chunk
                ),
            ));
        }

        let start = VirtualOffset::from_raw(self.read_u64()?);
        let end = VirtualOffset::from_raw(self.read_u64()?);
        let mapped = self.read_u64()?;
        let unmapped = self.read_u64()?;

        Ok(ReferenceMetadata {
            start,
            end,
            mapped,
            unmapped,
        })
    }

    /// The trailer is a single optional u64; absence is not an error, but a
    /// partial value is.
    fn read_trailer(&mut self) -> Result<Option<u64>> {
        let mut buf = [0u8; 8];
        let mut read = 0;
        while read < buf.len() {
            let n = self.reader.read(&mut buf[read..])?;
            if n == 0 {
                break;
            }
            read += n;
        }

        match read {
            0 => Ok(None),
            8 => {
                self.offset += 8;
                Ok(Some(u64::from_le_bytes(buf)))
            }
            _ => Err(self.malformed(self.offset + read as u64, "truncated trailer")),
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// After patching, the non-zero suffix of a linear index built from a
        /// sorted offset sequence is non-decreasing, and no interior zeros
        /// remain.
        #[test]
        fn test_patched_index_monotone(raw in proptest::collection::vec(0u64..1 << 40, 1..64)) {
            let mut sorted = raw.clone();
            sorted.sort_unstable();
            let mut intervals: Vec<VirtualOffset> =
                sorted.iter().map(|&v| VirtualOffset::from_raw(v)).collect();

            patch_linear_index(&mut intervals);

            let first_nonzero = intervals.iter().position(|v| !v.is_zero());
            if let Some(start) = first_nonzero {
                for window in intervals[start..].windows(2) {
                    assert!(window[0] <= window[1]);
                    assert!(!window[1].is_zero());
                }
            }
        }

        /// Patching an already-patched index changes nothing.
        #[test]
        fn test_patching_idempotent(raw in proptest::collection::vec(0u64..1 << 40, 1..64)) {
            let mut intervals: Vec<VirtualOffset> =
                raw.iter().map(|&v| VirtualOffset::from_raw(v)).collect();
            patch_linear_index(&mut intervals);
            let once = intervals.clone();
            let patched_again = patch_linear_index(&mut intervals);

            assert_eq!(patched_again, 0);
            assert_eq!(intervals, once);
        }
    }
}
