//! File-format parsing and writing.
//!
//! - [`primitives`]: shared genomic coordinate types
//! - [`index`]: alignment index formats (BAI)
//! - [`contigs`]: contig-size providers (TSV sidecar, BAM header)
//! - [`bed`]: target BED loading and partition BED writing

pub mod bed;
pub mod contigs;
pub mod index;
pub mod primitives;

pub use bed::{TargetSet, TargetSpan};
pub use contigs::References;
pub use index::BaiIndex;
pub use primitives::GenomicInterval;
