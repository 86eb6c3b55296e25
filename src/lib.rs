//! indextools: balanced genomic partitions from alignment index files.
//!
//! # Overview
//!
//! Sequence-alignment index files (notably the BAM Index, BAI) already
//! carry a coarse-grained signal of how much data each genomic region
//! holds. indextools extracts that signal to approximate per-region data
//! volume, then greedily packs the genome into a requested number of
//! contiguous intervals of approximately equal volume, suited
//! to parallel downstream analysis such as variant calling. The alignment
//! data itself is never read.
//!
//! # Quick Start
//!
//! ```no_run
//! use indextools::pipeline::{run_partition, CancelToken, ContigSource, PartitionConfig};
//!
//! # fn main() -> indextools::Result<()> {
//! let config = PartitionConfig {
//!     index: "sample.bam.bai".into(),
//!     contigs: ContigSource::Tsv("contig_sizes.txt".into()),
//!     targets: None,
//!     regions: Vec::new(),
//!     partitions: 16,
//!     output: "partitions.bed".into(),
//! };
//! let summary = run_partition(&config, &CancelToken::new())?;
//! println!("{} partitions written", summary.partitions.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Module Organization
//!
//! - [`formats`]: BAI parsing, contig-size providers, BED I/O
//! - [`volume`]: per-window volume estimation
//! - [`partition`]: target intersection and greedy partitioning
//! - [`pipeline`]: orchestration, cancellation, atomic output

#![warn(missing_docs)]

pub mod error;
pub mod formats;
pub mod partition;
pub mod pipeline;
pub mod volume;

// Re-export commonly used types
pub use error::{IndexToolsError, Result};
pub use formats::{BaiIndex, References, TargetSet};
pub use partition::Partition;
pub use pipeline::{run_partition, CancelToken, ContigSource, PartitionConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
