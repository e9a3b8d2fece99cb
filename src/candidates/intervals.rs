// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::Arc;

use bio_types::genome::{AbstractInterval, Interval};
use counter::Counter;
use getset::{CopyGetters, Getters};

use crate::candidates::cluster::Cluster;
use crate::evidence::ReadPair;
use crate::regions::RegionSet;

/// A contiguous genomic range supported by sufficient read depth.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Getters, CopyGetters)]
pub struct CandidateInterval {
    #[getset(get = "pub")]
    interval: Interval,
    #[getset(get_copy = "pub")]
    depth: u32,
    #[getset(get_copy = "pub")]
    in_target: bool,
}

impl CandidateInterval {
    pub fn new(contig: &str, start: u64, end: u64, depth: u32, regions: &RegionSet) -> Self {
        assert!(end >= start);
        CandidateInterval {
            interval: Interval::new(contig.to_owned(), start..end),
            depth,
            in_target: regions.overlaps(contig, start, end),
        }
    }

    pub fn contig(&self) -> &str {
        self.interval.contig()
    }

    pub fn start(&self) -> u64 {
        self.interval.range().start
    }

    pub fn end(&self) -> u64 {
        self.interval.range().end
    }

    pub fn len(&self) -> u64 {
        self.end() - self.start()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-position fragment coverage of `pairs` on one contig. A pair contributes
/// at most one to any position, so depth stays consistent with cluster depth
/// (pair count) even where the two mates of one fragment overlap.
pub fn coverage_counter(contig: &str, pairs: &[Arc<ReadPair>]) -> Counter<u64> {
    let mut counter = Counter::new();
    for pair in pairs {
        let r1_here = pair.r1.contig == contig;
        let r2_here = pair.r2.contig == contig;
        if r1_here && r2_here && pair.r2.start < pair.r1.end {
            // mates are start-ordered, so overlapping mates form one range
            counter.update(pair.r1.start..pair.r1.end.max(pair.r2.end));
            continue;
        }
        if r1_here {
            counter.update(pair.r1.start..pair.r1.end);
        }
        if r2_here {
            counter.update(pair.r2.start..pair.r2.end);
        }
    }
    counter
}

/// Turn per-position coverage into candidate intervals: positions at depth ≥
/// `min_depth` are joined into runs, runs closer than `merge_dist` are merged
/// (absorbing clustering jitter at breakpoints), and runs shorter than
/// `min_len` are dropped. Depth of an interval is its peak position depth.
pub fn intervals_from_coverage(
    counter: &Counter<u64>,
    contig: &str,
    min_depth: u32,
    min_len: u64,
    merge_dist: u64,
    regions: &RegionSet,
) -> Vec<CandidateInterval> {
    let mut positions: Vec<(u64, u32)> = counter
        .iter()
        .filter(|(_, count)| **count as u32 >= min_depth)
        .map(|(pos, count)| (*pos, *count as u32))
        .collect();
    positions.sort_unstable();

    let mut intervals = Vec::new();
    let mut run: Option<(u64, u64, u32)> = None;
    for (pos, depth) in positions {
        run = Some(match run {
            Some((start, end, peak)) if pos - end <= merge_dist => {
                (start, pos + 1, peak.max(depth))
            }
            Some((start, end, peak)) => {
                if end - start >= min_len {
                    intervals.push(CandidateInterval::new(contig, start, end, peak, regions));
                }
                (pos, pos + 1, depth)
            }
            None => (pos, pos + 1, depth),
        });
    }
    if let Some((start, end, peak)) = run {
        if end - start >= min_len {
            intervals.push(CandidateInterval::new(contig, start, end, peak, regions));
        }
    }
    intervals
}

/// Intrachromosomal mode: convert one contig's insert size clusters into
/// candidate intervals. Clusters failing the depth gate are discarded, cluster
/// spans failing the length gate likewise, and surviving spans closer than
/// `merge_dist` collapse into one interval whose depth is the total pair count.
/// Spans that do not intersect any target region are discarded.
pub fn intervals_from_clusters(
    clusters: &[Cluster],
    regions: &RegionSet,
    min_cluster_depth: u32,
    min_pileup_len: u64,
    merge_dist: u64,
) -> Vec<CandidateInterval> {
    let mut spans: Vec<(u64, u64, u32)> = clusters
        .iter()
        .filter(|cluster| cluster.depth() >= min_cluster_depth)
        .map(|cluster| {
            let (start, end) = cluster.span();
            (start, end, cluster.depth())
        })
        .filter(|(start, end, _)| end - start >= min_pileup_len)
        .collect();
    spans.sort_unstable();

    let mut intervals: Vec<CandidateInterval> = Vec::new();
    let mut merged: Vec<(u64, u64, u32)> = Vec::new();
    for (start, end, depth) in spans {
        match merged.last_mut() {
            Some((_, last_end, last_depth)) if start.saturating_sub(*last_end) <= merge_dist => {
                *last_end = (*last_end).max(end);
                *last_depth += depth;
            }
            _ => merged.push((start, end, depth)),
        }
    }
    for (start, end, depth) in merged {
        let contig = clusters
            .first()
            .map(|c| c.contig().as_str())
            .unwrap_or_default();
        let interval = CandidateInterval::new(contig, start, end, depth, regions);
        if !interval.in_target() {
            debug!(
                "{}:{}-{} dropped: no target region overlap",
                interval.contig(),
                interval.start(),
                interval.end()
            );
            continue;
        }
        intervals.push(interval);
    }
    intervals
}

/// Interchromosomal mode: per-contig candidate intervals for a group of read
/// pairs bridging one fixed unordered contig pair. Each side is gated on
/// depth, length and distance ≤ `bed_dist` from a target region; a group with
/// an empty side is dropped entirely (`None`), since both contigs must carry
/// support.
#[allow(clippy::too_many_arguments)]
pub fn cross_contig_intervals(
    contigs: &(String, String),
    pairs: &[Arc<ReadPair>],
    regions: &RegionSet,
    min_cluster_depth: u32,
    min_pileup_len: u64,
    merge_dist: u64,
    bed_dist: u64,
) -> Option<Vec<Vec<CandidateInterval>>> {
    let mut groups = Vec::with_capacity(2);
    for contig in &[&contigs.0, &contigs.1] {
        let counter = coverage_counter(contig, pairs);
        let intervals: Vec<CandidateInterval> = intervals_from_coverage(
            &counter,
            contig,
            min_cluster_depth,
            min_pileup_len,
            merge_dist,
            regions,
        )
        .into_iter()
        .filter(|interval| {
            regions
                .distance(contig, interval.start(), interval.end())
                .map_or(false, |d| d <= bed_dist)
        })
        .collect();
        if intervals.is_empty() {
            debug!(
                "cross-contig group {}/{} dropped: no candidate interval on {}",
                contigs.0, contigs.1, contig
            );
            return None;
        }
        groups.push(intervals);
    }
    Some(groups)
}
