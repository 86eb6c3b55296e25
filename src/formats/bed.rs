//! BED targets in, partition BED out.
//!
//! Targets restrict partitioning to regions of interest. They are loaded
//! from a BED file (≥3 tab-separated columns, 0-based half-open,
//! optionally gzip-compressed) and/or from `contig[:start-end]` region
//! strings, resolved against the contig provider, clipped to contig
//! bounds, sorted into reference order and merged. Merging an
//! already-merged set is the identity.
//!
//! The writer emits one record per partition:
//! `contig  start  end  name  volume  .  [feature_count]`
//! sorted by reference order then start, trailing newline, no header.

use crate::error::{IndexToolsError, Result};
use crate::formats::contigs::References;
use crate::formats::primitives::GenomicInterval;
use crate::partition::Partition;
use flate2::read::MultiGzDecoder;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;

/// A merged target region on one contig, identified by its rank in
/// genomic order across the whole set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSpan {
    /// Start position (0-based, inclusive).
    pub start: u64,
    /// End position (exclusive).
    pub end: u64,
    /// Genome-wide target id (reference order, then start).
    pub id: usize,
}

/// Sorted, merged target regions grouped by reference slot.
#[derive(Debug, Clone, Default)]
pub struct TargetSet {
    per_contig: Vec<Vec<TargetSpan>>,
    count: usize,
}

impl TargetSet {
    /// Build a target set from raw intervals.
    ///
    /// Intervals on contigs unknown to the provider are skipped with a
    /// warning; the rest are clipped to `[0, contig_length)`, sorted and
    /// merged (overlapping or touching intervals coalesce). Ids are
    /// assigned in genomic order after merging.
    pub fn build(intervals: Vec<GenomicInterval>, references: &References) -> Self {
        let mut per_contig: Vec<Vec<(u64, u64)>> = vec![Vec::new(); references.len()];
        let mut unknown: HashSet<String> = HashSet::new();

        for ivl in intervals {
            let Some(slot) = references.position(&ivl.contig) else {
                if unknown.insert(ivl.contig.clone()) {
                    log::warn!("skipping target on unknown contig '{}'", ivl.contig);
                }
                continue;
            };

            let length = references.length(slot).unwrap_or(0);
            let end = ivl.end.min(length);
            if ivl.start >= end {
                continue;
            }
            per_contig[slot].push((ivl.start, end));
        }

        let mut merged: Vec<Vec<TargetSpan>> = Vec::with_capacity(per_contig.len());
        let mut next_id = 0;
        for mut spans in per_contig {
            spans.sort_unstable();

            let mut out: Vec<TargetSpan> = Vec::with_capacity(spans.len());
            for (start, end) in spans {
                match out.last_mut() {
                    Some(last) if start <= last.end => {
                        last.end = last.end.max(end);
                    }
                    _ => {
                        out.push(TargetSpan {
                            start,
                            end,
                            id: next_id,
                        });
                        next_id += 1;
                    }
                }
            }
            merged.push(out);
        }

        TargetSet {
            per_contig: merged,
            count: next_id,
        }
    }

    /// Load targets from a BED file (plain or gzip-compressed).
    pub fn from_bed<P: AsRef<Path>>(path: P, references: &References) -> Result<Self> {
        Ok(Self::build(read_bed_intervals(path)?, references))
    }

    /// Number of merged targets across all contigs.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Whether the set carries no targets at all.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Merged spans on the given reference slot, sorted by start.
    pub fn spans(&self, slot: usize) -> &[TargetSpan] {
        self.per_contig
            .get(slot)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Read raw intervals from a BED file (plain or gzip-compressed),
/// skipping blank lines, comments and track/browser lines.
pub fn read_bed_intervals<P: AsRef<Path>>(path: P) -> Result<Vec<GenomicInterval>> {
    let reader = open_text(path.as_ref())?;

    let mut intervals = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim_end();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || trimmed.starts_with("track")
            || trimmed.starts_with("browser")
        {
            continue;
        }

        intervals.push(parse_bed_line(trimmed, line_no + 1)?);
    }

    Ok(intervals)
}

fn parse_bed_line(line: &str, line_no: usize) -> Result<GenomicInterval> {
    let invalid = |msg: String| IndexToolsError::InvalidFormat {
        format: "BED",
        msg: format!("line {}: {}", line_no, msg),
    };

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 3 {
        return Err(invalid(format!(
            "expected at least 3 columns, got {}",
            fields.len()
        )));
    }

    let start: u64 = fields[1]
        .parse()
        .map_err(|_| invalid(format!("invalid start '{}'", fields[1])))?;
    let end: u64 = fields[2]
        .parse()
        .map_err(|_| invalid(format!("invalid end '{}'", fields[2])))?;
    if start >= end {
        return Err(invalid(format!("empty or inverted interval {}-{}", start, end)));
    }

    GenomicInterval::new(fields[0].to_string(), start, end)
}

/// Parse a `contig`, `contig:start-end` or `contig:start-*` region string
/// into an interval. Positions are 1-based inclusive, as in samtools;
/// `*` means the end of the contig.
///
/// Returns `None` (with a warning) when the contig is unknown to the
/// provider.
pub fn parse_region(region: &str, references: &References) -> Result<Option<GenomicInterval>> {
    let invalid = |msg: String| IndexToolsError::InvalidFormat {
        format: "region",
        msg: format!("'{}': {}", region, msg),
    };

    let (contig, range) = match region.split_once(':') {
        None => (region, None),
        Some((contig, range)) => (contig, Some(range)),
    };

    let Some(slot) = references.position(contig) else {
        log::warn!("skipping region on unknown contig '{}'", contig);
        return Ok(None);
    };
    let length = references.length(slot).unwrap_or(0);

    let (start, end) = match range {
        None => (0, length),
        Some(range) => {
            let (start_str, end_str) = range
                .split_once('-')
                .ok_or_else(|| invalid("expected start-end".into()))?;
            let start: u64 = start_str
                .parse()
                .map_err(|_| invalid(format!("invalid start '{}'", start_str)))?;
            if start == 0 {
                return Err(invalid("start must be >= 1".into()));
            }
            let end = if end_str == "*" {
                length
            } else {
                end_str
                    .parse()
                    .map_err(|_| invalid(format!("invalid end '{}'", end_str)))?
            };
            (start - 1, end)
        }
    };

    let end = end.min(length);
    if start >= end {
        return Err(invalid("start must be <= end and inside the contig".into()));
    }

    Ok(Some(GenomicInterval::new(contig.to_string(), start, end)?))
}

/// Write partitions as BED records.
///
/// When `with_features` is set (target intersection was active), a
/// `feature_count` column is appended after the placeholder column.
pub fn write_partitions<W: Write>(
    out: &mut W,
    references: &References,
    partitions: &[Partition],
    with_features: bool,
) -> io::Result<()> {
    for partition in partitions {
        let contig = references.name(partition.contig).unwrap_or(".");
        write!(
            out,
            "{}\t{}\t{}\t{}\t{}\t.",
            contig, partition.start, partition.end, partition.name, partition.volume
        )?;
        if with_features {
            write!(out, "\t{}", partition.feature_count.unwrap_or(0))?;
        }
        writeln!(out)?;
    }
    out.flush()
}

/// Open a text file, transparently decompressing gzip (detected by magic).
fn open_text(path: &Path) -> Result<Box<dyn BufRead>> {
    let mut file = File::open(path)?;

    let mut magic = [0u8; 2];
    let n = file.read(&mut magic)?;
    let file = File::open(path)?;

    if n == 2 && magic == [0x1f, 0x8b] {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs() -> References {
        References::new(vec![
            ("chr1".to_string(), 100_000),
            ("chr2".to_string(), 50_000),
        ])
    }

    fn ivl(contig: &str, start: u64, end: u64) -> GenomicInterval {
        GenomicInterval::new(contig.to_string(), start, end).unwrap()
    }

    #[test]
    fn test_build_sorts_and_merges() {
        let set = TargetSet::build(
            vec![
                ivl("chr2", 0, 100),
                ivl("chr1", 500, 900),
                ivl("chr1", 100, 600),
                ivl("chr1", 2000, 3000),
            ],
            &refs(),
        );

        assert_eq!(set.count(), 3);
        let chr1 = set.spans(0);
        assert_eq!(chr1.len(), 2);
        assert_eq!((chr1[0].start, chr1[0].end, chr1[0].id), (100, 900, 0));
        assert_eq!((chr1[1].start, chr1[1].end, chr1[1].id), (2000, 3000, 1));
        let chr2 = set.spans(1);
        assert_eq!((chr2[0].start, chr2[0].end, chr2[0].id), (0, 100, 2));
    }

    #[test]
    fn test_build_clips_and_skips_unknown() {
        let set = TargetSet::build(
            vec![ivl("chr2", 49_000, 80_000), ivl("chrX", 0, 100)],
            &refs(),
        );

        assert_eq!(set.count(), 1);
        assert_eq!(set.spans(1)[0].end, 50_000);
    }

    #[test]
    fn test_merge_idempotent() {
        let set = TargetSet::build(
            vec![ivl("chr1", 100, 600), ivl("chr1", 500, 900)],
            &refs(),
        );

        let remerged = TargetSet::build(
            set.spans(0)
                .iter()
                .map(|s| ivl("chr1", s.start, s.end))
                .collect(),
            &refs(),
        );

        assert_eq!(remerged.spans(0), set.spans(0));
        assert_eq!(remerged.count(), set.count());
    }

    #[test]
    fn test_from_bed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.bed");
        std::fs::write(
            &path,
            "# comment\ntrack name=targets\nchr1\t100\t200\tfirst\nchr1\t150\t300\n\nchr2\t0\t10\n",
        )
        .unwrap();

        let set = TargetSet::from_bed(&path, &refs()).unwrap();
        assert_eq!(set.count(), 2);
        assert_eq!(set.spans(0).len(), 1);
        assert_eq!((set.spans(0)[0].start, set.spans(0)[0].end), (100, 300));
    }

    #[test]
    fn test_from_bed_rejects_inverted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.bed");
        std::fs::write(&path, "chr1\t200\t100\n").unwrap();

        assert!(TargetSet::from_bed(&path, &refs()).is_err());
    }

    #[test]
    fn test_parse_region() {
        let references = refs();

        let whole = parse_region("chr1", &references).unwrap().unwrap();
        assert_eq!((whole.start, whole.end), (0, 100_000));

        let ranged = parse_region("chr1:101-1000", &references).unwrap().unwrap();
        assert_eq!((ranged.start, ranged.end), (100, 1000));

        let open = parse_region("chr2:1-*", &references).unwrap().unwrap();
        assert_eq!((open.start, open.end), (0, 50_000));

        assert!(parse_region("chr1:0-10", &references).is_err());
        assert!(parse_region("chrX:1-10", &references).unwrap().is_none());
    }

    #[test]
    fn test_write_partitions_layout() {
        let partitions = vec![
            Partition {
                contig: 0,
                start: 0,
                end: 16_384,
                volume: 1200,
                feature_count: None,
                name: "p1".to_string(),
            },
            Partition {
                contig: 1,
                start: 0,
                end: 50_000,
                volume: 0,
                feature_count: None,
                name: "p2".to_string(),
            },
        ];

        let mut out = Vec::new();
        write_partitions(&mut out, &refs(), &partitions, false).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "chr1\t0\t16384\tp1\t1200\t.\nchr2\t0\t50000\tp2\t0\t.\n"
        );
    }

    #[test]
    fn test_write_partitions_with_features() {
        let partitions = vec![Partition {
            contig: 0,
            start: 100,
            end: 300,
            volume: 55,
            feature_count: Some(2),
            name: "p1".to_string(),
        }];

        let mut out = Vec::new();
        write_partitions(&mut out, &refs(), &partitions, true).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "chr1\t100\t300\tp1\t55\t.\t2\n"
        );
    }
}
