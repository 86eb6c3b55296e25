//! Shared fixtures: synthetic BAI byte images and input files.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Pack a virtual offset from a compressed block offset and a
/// within-block offset.
pub fn vfo(block: u64, within: u16) -> u64 {
    (block << 16) | within as u64
}

/// One reference slot of a synthetic BAI.
#[derive(Debug, Clone, Default)]
pub struct RefIndex {
    /// Coverage bins: `(bin_id, chunks)`.
    pub bins: Vec<(u32, Vec<(u64, u64)>)>,
    /// Linear-index entries (raw virtual offsets).
    pub intervals: Vec<u64>,
    /// Metadata pseudo-bin: `((start, end), (mapped, unmapped))`.
    pub metadata: Option<((u64, u64), (u64, u64))>,
}

/// A reference whose linear index advances by `step` compressed blocks
/// per tile: every one of `tiles` tiles gets volume `step << 16`.
pub fn uniform_ref(tiles: u64, step: u64) -> RefIndex {
    let intervals: Vec<u64> = (0..tiles).map(|t| vfo(1 + t * step, 0)).collect();
    let end = vfo(1 + tiles * step, 0);
    RefIndex {
        bins: vec![(4681, vec![(intervals[0], end)])],
        intervals,
        metadata: None,
    }
}

/// A reference slot with no coverage data.
pub fn empty_ref() -> RefIndex {
    RefIndex::default()
}

/// Serialize reference slots into BAI bytes.
pub fn bai_bytes(refs: &[RefIndex]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(b"BAI\x01");
    buf.extend_from_slice(&(refs.len() as i32).to_le_bytes());

    for reference in refs {
        let n_bin = reference.bins.len() as i32 + i32::from(reference.metadata.is_some());
        buf.extend_from_slice(&n_bin.to_le_bytes());

        for (bin_id, chunks) in &reference.bins {
            buf.extend_from_slice(&bin_id.to_le_bytes());
            buf.extend_from_slice(&(chunks.len() as i32).to_le_bytes());
            for (beg, end) in chunks {
                buf.extend_from_slice(&beg.to_le_bytes());
                buf.extend_from_slice(&end.to_le_bytes());
            }
        }

        if let Some(((start, end), (mapped, unmapped))) = reference.metadata {
            buf.extend_from_slice(&37450u32.to_le_bytes());
            buf.extend_from_slice(&2i32.to_le_bytes());
            buf.extend_from_slice(&start.to_le_bytes());
            buf.extend_from_slice(&end.to_le_bytes());
            buf.extend_from_slice(&mapped.to_le_bytes());
            buf.extend_from_slice(&unmapped.to_le_bytes());
        }

        buf.extend_from_slice(&(reference.intervals.len() as i32).to_le_bytes());
        for interval in &reference.intervals {
            buf.extend_from_slice(&interval.to_le_bytes());
        }
    }

    buf
}

/// Write a synthetic BAI into `dir` and return its path.
pub fn write_bai(dir: &Path, name: &str, refs: &[RefIndex]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bai_bytes(refs)).unwrap();
    path
}

/// Write a contig-sizes TSV into `dir` and return its path.
pub fn write_sizes(dir: &Path, name: &str, sizes: &[(&str, u64)]) -> PathBuf {
    let path = dir.join(name);
    let mut text = String::new();
    for (contig, length) in sizes {
        text.push_str(&format!("{}\t{}\n", contig, length));
    }
    std::fs::write(&path, text).unwrap();
    path
}
