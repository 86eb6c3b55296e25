//! Greedy equal-volume partitioning.
//!
//! The partitioner consumes per-contig window streams and packs them into
//! `N` contiguous partitions whose total volumes approach `total / N`.
//!
//! # Algorithm
//!
//! 1. Materialize the window stream per contig and compute the total
//!    volume. Thresholds `k * total / N` are kept as exact rationals and
//!    compared by cross-multiplication, so the nearest-threshold test
//!    never drifts.
//! 2. Walk windows in genomic order, closing the current partition when
//!    the cumulative volume without the next window is at least as close
//!    to the next threshold as the cumulative volume with it (ties close
//!    at the earlier boundary).
//! 3. Boundary rules, in precedence order: a partition never crosses a
//!    contig boundary; a close is deferred while it would split a target;
//!    a zero-volume tail joins the preceding partition on its contig.
//! 4. Rebalance: merge the smallest adjacent within-contig pair while too
//!    many partitions exist (dropping zero-volume whole-contig partitions
//!    when nothing can merge), and recursively split the largest
//!    partition at its internal nearest-threshold point while too few
//!    exist. Splits may land inside a window, in which case the window is
//!    sliced with length-proportional volume.
//!
//! When the total volume is zero the windows are re-weighted by genomic
//! length and the same sweep runs, which degrades gracefully to
//! equal-width partitions; the run is flagged with a warning.

pub mod intersect;

pub use intersect::{apply_targets, unmasked, MaskedWindow};

use crate::error::{IndexToolsError, Result};

/// Windows of one reference, in ascending genomic order.
#[derive(Debug, Clone)]
pub struct ContigWindows {
    /// Reference slot in BAI order.
    pub contig: usize,
    /// Window pieces covering the contig (possibly empty).
    pub windows: Vec<MaskedWindow>,
}

/// A partition ready for emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Reference slot in BAI order.
    pub contig: usize,
    /// Start position (0-based, inclusive).
    pub start: u64,
    /// End position (exclusive).
    pub end: u64,
    /// Total estimated volume.
    pub volume: u64,
    /// Number of distinct targets covered, when targets were supplied.
    pub feature_count: Option<usize>,
    /// Emission-order name (`p0001` style).
    pub name: String,
}

/// A window piece with its balancing weight.
///
/// The weight equals the volume except in the degenerate zero-volume
/// fallback, where it is the piece length.
#[derive(Debug, Clone, Copy)]
struct Piece {
    start: u64,
    end: u64,
    volume: u64,
    weight: u64,
    target: Option<usize>,
}

impl Piece {
    fn length(&self) -> u64 {
        self.end - self.start
    }

    /// Slice at `offset` bp from the start, distributing volume and
    /// weight proportionally (left side rounded up).
    fn slice(&self, offset: u64) -> (Piece, Piece) {
        let len = self.length();
        let vol_left = div_ceil_u128(offset as u128 * self.volume as u128, len as u128) as u64;
        let w_left = div_ceil_u128(offset as u128 * self.weight as u128, len as u128) as u64;

        let left = Piece {
            start: self.start,
            end: self.start + offset,
            volume: vol_left,
            weight: w_left,
            target: self.target,
        };
        let right = Piece {
            start: self.start + offset,
            end: self.end,
            volume: self.volume - vol_left,
            weight: self.weight - w_left,
            target: self.target,
        };
        (left, right)
    }
}

fn div_ceil_u128(num: u128, den: u128) -> u128 {
    (num + den - 1) / den
}

/// A partition under construction: an ordered run of pieces on one contig.
#[derive(Debug, Clone)]
struct Part {
    contig: usize,
    pieces: Vec<Piece>,
    weight: u128,
}

impl Part {
    fn new(contig: usize, pieces: Vec<Piece>) -> Self {
        let weight = pieces.iter().map(|p| p.weight as u128).sum();
        Part {
            contig,
            pieces,
            weight,
        }
    }

    fn absorb(&mut self, right: Part) {
        self.pieces.extend(right.pieces);
        self.weight += right.weight;
    }
}

/// Where a partition splits: before piece `index`, or `offset` bp into it.
#[derive(Debug, Clone, Copy)]
enum SplitPoint {
    Boundary(usize),
    Interior(usize, u64),
}

/// Pack the genome's windows into exactly `requested` partitions.
///
/// `masked` indicates that target intersection was active: partitions are
/// then trimmed to target-bearing windows and carry a feature count.
pub fn partition_genome(
    genome: &[ContigWindows],
    requested: usize,
    masked: bool,
) -> Result<Vec<Partition>> {
    if requested == 0 {
        return Err(IndexToolsError::Usage(
            "partition count must be at least 1".into(),
        ));
    }

    let real_total: u128 = genome
        .iter()
        .flat_map(|cw| cw.windows.iter())
        .map(|w| w.volume as u128)
        .sum();
    let degenerate = real_total == 0;
    if degenerate {
        log::warn!("volume signal is empty; falling back to partitioning by genomic length");
    }

    // Balancing weights: volumes, or lengths in the degenerate fallback
    // (restricted to target pieces when a mask is active).
    let contig_pieces: Vec<(usize, Vec<Piece>)> = genome
        .iter()
        .map(|cw| {
            let pieces = cw
                .windows
                .iter()
                .map(|w| {
                    let weight = if !degenerate {
                        w.volume
                    } else if !masked || w.target.is_some() {
                        w.length()
                    } else {
                        0
                    };
                    Piece {
                        start: w.start,
                        end: w.end,
                        volume: w.volume,
                        weight,
                        target: w.target,
                    }
                })
                .collect();
            (cw.contig, pieces)
        })
        .collect();

    let total: u128 = contig_pieces
        .iter()
        .flat_map(|(_, pieces)| pieces.iter())
        .map(|p| p.weight as u128)
        .sum();
    let non_empty = contig_pieces
        .iter()
        .flat_map(|(_, pieces)| pieces.iter())
        .filter(|p| p.weight > 0)
        .count();
    if requested > non_empty {
        return Err(IndexToolsError::InfeasiblePartitioning {
            requested,
            achievable: non_empty,
        });
    }

    let mut parts = greedy_sweep(contig_pieces, total, requested);

    if masked {
        parts.retain(|p| p.pieces.iter().any(|x| x.target.is_some()));
    }

    rebalance(&mut parts, requested)?;

    Ok(emit(parts, requested, masked))
}

/// Nearest-threshold sweep over the genome, honoring the boundary rules:
/// contig closes, target-close deferral, zero-volume tail absorption.
fn greedy_sweep(contig_pieces: Vec<(usize, Vec<Piece>)>, total: u128, requested: usize) -> Vec<Part> {
    let den = requested as i128;
    let tot = total as i128;

    let mut parts: Vec<Part> = Vec::new();
    let mut closed: i128 = 0;

    for (contig, pieces) in contig_pieces {
        let mut current: Vec<Piece> = Vec::new();
        let mut acc: i128 = 0;

        for piece in pieces {
            if acc > 0 && piece.weight > 0 {
                let threshold = (parts.len() as i128 + 1) * tot;
                let without = (closed + acc) * den;
                let with = (closed + acc + piece.weight as i128) * den;
                let closes = (without - threshold).abs() <= (with - threshold).abs();

                // deferring keeps a target within one partition
                let splits_target = piece.target.is_some()
                    && current.last().map(|p| p.target) == Some(piece.target);

                if closes && !splits_target {
                    closed += acc;
                    acc = 0;
                    parts.push(Part::new(contig, std::mem::take(&mut current)));
                }
            }
            acc += piece.weight as i128;
            current.push(piece);
        }

        // contig boundary always closes; a zero-weight run joins the
        // previous partition on the same contig instead of standing alone
        if !current.is_empty() {
            if acc == 0 && parts.last().map(|p| p.contig) == Some(contig) {
                let last = parts.last_mut().expect("checked non-empty");
                last.pieces.extend(current);
            } else {
                closed += acc;
                parts.push(Part::new(contig, current));
            }
        }
    }

    parts
}

/// Merge or split until exactly `requested` partitions remain.
fn rebalance(parts: &mut Vec<Part>, requested: usize) -> Result<()> {
    // too many: merge the smallest adjacent within-contig pair; when no
    // pair exists, drop zero-weight whole-contig partitions
    while parts.len() > requested {
        let mut best: Option<(usize, u128)> = None;
        for j in 0..parts.len() - 1 {
            if parts[j].contig == parts[j + 1].contig {
                let combined = parts[j].weight + parts[j + 1].weight;
                if best.map_or(true, |(_, w)| combined < w) {
                    best = Some((j, combined));
                }
            }
        }

        match best {
            Some((j, _)) => {
                let right = parts.remove(j + 1);
                parts[j].absorb(right);
            }
            None => match parts.iter().rposition(|p| p.weight == 0) {
                Some(j) => {
                    parts.remove(j);
                }
                None => {
                    return Err(IndexToolsError::InfeasiblePartitioning {
                        requested,
                        achievable: parts.len(),
                    });
                }
            },
        }
    }

    // too few: split the largest partition at its internal
    // nearest-threshold point
    while parts.len() < requested {
        let mut order: Vec<usize> = (0..parts.len()).collect();
        order.sort_by(|&a, &b| parts[b].weight.cmp(&parts[a].weight).then(a.cmp(&b)));

        let mut split = None;
        for &pi in &order {
            if let Some(point) = best_split(&parts[pi]) {
                split = Some((pi, point));
                break;
            }
        }

        let Some((pi, point)) = split else {
            return Err(IndexToolsError::InfeasiblePartitioning {
                requested,
                achievable: parts.len(),
            });
        };

        let part = parts.remove(pi);
        let (left, right) = apply_split(part, point);
        parts.insert(pi, right);
        parts.insert(pi, left);
    }

    Ok(())
}

/// Best internal split point of a partition: the piece boundary or
/// in-piece offset whose left side is nearest to half the weight. Ties
/// resolve to the earliest position. `None` when no split yields two
/// non-empty sides.
fn best_split(part: &Part) -> Option<SplitPoint> {
    let total = part.weight;
    if total < 2 {
        return None;
    }

    let mut best: Option<(SplitPoint, u128)> = None;
    let mut consider = |point: SplitPoint, left: u128| {
        if left == 0 || left >= total {
            return;
        }
        let dist = (2 * left).abs_diff(total);
        if best.map_or(true, |(_, d)| dist < d) {
            best = Some((point, dist));
        }
    };

    let mut cum: u128 = 0;
    for (i, piece) in part.pieces.iter().enumerate() {
        if i > 0 {
            consider(SplitPoint::Boundary(i), cum);
        }

        let w = piece.weight as u128;
        if w > 0 && 2 * cum < total && 2 * (cum + w) > total && piece.length() >= 2 {
            let len = piece.length() as u128;
            let num = total - 2 * cum;
            let offset = ((num * len + w) / (2 * w)).clamp(1, len - 1) as u64;
            let w_left = div_ceil_u128(offset as u128 * w, len);
            if w_left > 0 && w_left < w {
                consider(SplitPoint::Interior(i, offset), cum + w_left);
            }
        }

        cum += w;
    }

    best.map(|(point, _)| point)
}

fn apply_split(part: Part, point: SplitPoint) -> (Part, Part) {
    let contig = part.contig;
    let mut pieces = part.pieces;
    match point {
        SplitPoint::Boundary(i) => {
            let right = pieces.split_off(i);
            (Part::new(contig, pieces), Part::new(contig, right))
        }
        SplitPoint::Interior(i, offset) => {
            let (a, b) = pieces[i].slice(offset);
            let mut right = pieces.split_off(i + 1);
            pieces[i] = a;
            right.insert(0, b);
            (Part::new(contig, pieces), Part::new(contig, right))
        }
    }
}

/// Assign names and project parts to their emission records.
fn emit(parts: Vec<Part>, requested: usize, masked: bool) -> Vec<Partition> {
    debug_assert_eq!(parts.len(), requested);
    let width = decimal_width(requested);

    parts
        .into_iter()
        .enumerate()
        .map(|(idx, part)| {
            let (start, end) = if masked {
                // trim the outer edges to target-bearing pieces
                let first = part
                    .pieces
                    .iter()
                    .find(|p| p.target.is_some())
                    .expect("masked partitions carry at least one target piece");
                let last = part
                    .pieces
                    .iter()
                    .rev()
                    .find(|p| p.target.is_some())
                    .expect("masked partitions carry at least one target piece");
                (first.start, last.end)
            } else {
                (
                    part.pieces.first().expect("partitions are non-empty").start,
                    part.pieces.last().expect("partitions are non-empty").end,
                )
            };

            let volume: u128 = part.pieces.iter().map(|p| p.volume as u128).sum();
            let feature_count = if masked {
                let mut count = 0;
                let mut last_id = None;
                for piece in &part.pieces {
                    if piece.target.is_some() && piece.target != last_id {
                        count += 1;
                        last_id = piece.target;
                    }
                }
                Some(count)
            } else {
                None
            };

            Partition {
                contig: part.contig,
                start,
                end,
                volume: volume.min(u64::MAX as u128) as u64,
                feature_count,
                name: format!("p{:0width$}", idx + 1, width = width),
            }
        })
        .collect()
}

/// Number of decimal digits in `n` (partition-name width).
fn decimal_width(n: usize) -> usize {
    let mut width = 1;
    let mut rest = n / 10;
    while rest > 0 {
        width += 1;
        rest /= 10;
    }
    width
}
