//! Alignment index format support.
//!
//! Currently covers the BAM Index (BAI). CSI and CRAM indexes are out of
//! scope.

pub mod bai;

pub use bai::{BaiIndex, Bin, Chunk, ReferenceIndex, ReferenceMetadata, VirtualOffset};
