//! Pipeline driver: validation, orchestration, atomic output.
//!
//! Stages run in dependency order: contig provider, BAI reader, target
//! loading, per-reference volume estimation (parallel, reassembled in
//! reference order so output is independent of thread interleavings),
//! target intersection, partitioning, BED writing. A [`CancelToken`] is
//! checked between stages; the output file is written through a temporary
//! path in the destination directory and renamed on success, so failures
//! never leave partial output behind.

use crate::error::{IndexToolsError, Result};
use crate::formats::bed::{self, TargetSet};
use crate::formats::contigs::References;
use crate::formats::index::BaiIndex;
use crate::partition::{self, ContigWindows, Partition};
use crate::volume;
use flate2::write::GzEncoder;
use flate2::Compression;
use rayon::prelude::*;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cooperative cancellation token, checked between pipeline stages.
///
/// Cloning shares the underlying flag. An optional deadline turns the
/// token into an overall wall-clock limit.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that only cancels when [`CancelToken::cancel`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that additionally cancels once `limit` has elapsed.
    pub fn with_deadline(limit: Duration) -> Self {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + limit),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation has been requested or the deadline passed.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Error when cancelled, `Ok` otherwise.
    pub fn ensure_active(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(IndexToolsError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Where contig sizes come from.
#[derive(Debug, Clone)]
pub enum ContigSource {
    /// Reference dictionary of a BAM file's header.
    Bam(PathBuf),
    /// Two-column tab-separated sidecar file.
    Tsv(PathBuf),
}

/// Inputs of a partition run.
#[derive(Debug, Clone)]
pub struct PartitionConfig {
    /// BAI index to estimate volumes from.
    pub index: PathBuf,
    /// Contig-size provider.
    pub contigs: ContigSource,
    /// Optional target BED restricting the partitions.
    pub targets: Option<PathBuf>,
    /// Optional `contig[:start-end]` region strings, merged into the targets.
    pub regions: Vec<String>,
    /// Number of partitions to produce.
    pub partitions: usize,
    /// Output BED path (gzip-compressed when it ends with `.gz`).
    pub output: PathBuf,
}

/// Result of a successful partition run.
#[derive(Debug)]
pub struct PartitionSummary {
    /// Emitted partitions, in output order.
    pub partitions: Vec<Partition>,
    /// Sum of partition volumes.
    pub total_volume: u64,
    /// Whether target intersection was active.
    pub masked: bool,
}

/// Run the partition pipeline end to end and write the output BED.
pub fn run_partition(config: &PartitionConfig, cancel: &CancelToken) -> Result<PartitionSummary> {
    if config.partitions < 1 {
        return Err(IndexToolsError::Usage(
            "partition count must be at least 1".into(),
        ));
    }

    let references = match &config.contigs {
        ContigSource::Bam(path) => References::from_bam(path)?,
        ContigSource::Tsv(path) => References::from_tsv(path)?,
    };
    cancel.ensure_active()?;

    let index = BaiIndex::from_path(&config.index)?;
    if let Some(unplaced) = index.unplaced {
        log::debug!("index reports {} unplaced reads", unplaced);
    }
    cancel.ensure_active()?;

    // The BAI carries no names, so consistency with the provider can only
    // be checked by slot count.
    if references.len() != index.references.len() {
        return Err(IndexToolsError::InconsistentInputs(format!(
            "contig provider lists {} contigs but the index has {} reference slots",
            references.len(),
            index.references.len()
        )));
    }

    let targets = load_targets(config, &references)?;
    cancel.ensure_active()?;

    // Per-reference estimation may run in parallel; the indexed collect
    // reassembles windows in reference order. Contigs the index carries no
    // data for still get a zero grid so the partitioner can cover them.
    let windows: Vec<Vec<volume::Window>> = index
        .references
        .par_iter()
        .enumerate()
        .map(|(slot, reference)| {
            let length = references.length(slot).unwrap_or(0);
            let estimated = volume::estimate_windows(reference, length);
            if estimated.is_empty() {
                volume::empty_windows(length)
            } else {
                estimated
            }
        })
        .collect();
    cancel.ensure_active()?;

    let masked = targets.is_some();
    let genome: Vec<ContigWindows> = windows
        .iter()
        .enumerate()
        .map(|(slot, contig_windows)| ContigWindows {
            contig: slot,
            windows: match &targets {
                Some(set) => partition::apply_targets(contig_windows, set.spans(slot)),
                None => partition::unmasked(contig_windows),
            },
        })
        .collect();
    cancel.ensure_active()?;

    let partitions = partition::partition_genome(&genome, config.partitions, masked)?;
    cancel.ensure_active()?;

    write_output(&config.output, &references, &partitions, masked)?;

    let total_volume = partitions
        .iter()
        .map(|p| p.volume as u128)
        .sum::<u128>()
        .min(u64::MAX as u128) as u64;

    Ok(PartitionSummary {
        partitions,
        total_volume,
        masked,
    })
}

/// Combine the target BED and region strings into one merged set.
///
/// An empty result (empty BED, or every entry skipped) is equivalent to
/// "no targets".
fn load_targets(config: &PartitionConfig, references: &References) -> Result<Option<TargetSet>> {
    if config.targets.is_none() && config.regions.is_empty() {
        return Ok(None);
    }

    let mut intervals = Vec::new();
    if let Some(path) = &config.targets {
        intervals.extend(bed::read_bed_intervals(path)?);
    }
    for region in &config.regions {
        if let Some(interval) = bed::parse_region(region, references)? {
            intervals.push(interval);
        }
    }

    let set = TargetSet::build(intervals, references);
    if set.is_empty() {
        log::warn!("target set is empty; partitioning the whole genome");
        Ok(None)
    } else {
        Ok(Some(set))
    }
}

/// Write the partition BED atomically: temp file in the destination
/// directory, rename on success. The temporary is removed on any failure.
fn write_output(
    path: &Path,
    references: &References,
    partitions: &[Partition],
    masked: bool,
) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;

    let gzip = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    if gzip {
        let mut encoder = GzEncoder::new(BufWriter::new(tmp.as_file_mut()), Compression::default());
        bed::write_partitions(&mut encoder, references, partitions, masked)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        bed::write_partitions(&mut writer, references, partitions, masked)?;
    }

    tmp.persist(path).map_err(|e| IndexToolsError::Io(e.error))?;
    Ok(())
}
