//! support.rs
//!
//! Second-pass evidence collection: given a candidate interval, gather every
//! read pair of the full record set overlapping it at the mapping quality
//! floor. Backed by a per-contig coordinate-sorted index built once per run,
//! so each lookup is a binary search instead of a scan over all records.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::candidates::intervals::CandidateInterval;
use crate::evidence::ReadPair;

#[derive(Debug, Default)]
struct ContigIndex {
    // (start, end, mapq of the mate aligned here, pair), sorted by start
    entries: Vec<(u64, u64, u8, Arc<ReadPair>)>,
    max_span: u64,
}

/// Read-only index over the full record set, shared by all per-contig tasks.
#[derive(Debug, Default)]
pub struct RecordIndex {
    by_contig: HashMap<String, ContigIndex>,
}

impl RecordIndex {
    pub fn new(pairs: &[Arc<ReadPair>]) -> Self {
        let mut by_contig: HashMap<String, ContigIndex> = HashMap::new();
        for pair in pairs {
            for mate in &[&pair.r1, &pair.r2] {
                let index = by_contig.entry(mate.contig.clone()).or_default();
                index
                    .entries
                    .push((mate.start, mate.end, mate.mapq, Arc::clone(pair)));
                index.max_span = index.max_span.max(mate.end - mate.start);
            }
        }
        for index in by_contig.values_mut() {
            index.entries.sort_by_key(|(start, end, _, _)| (*start, *end));
        }
        RecordIndex { by_contig }
    }

    /// All read pairs with a mate of mapping quality ≥ `min_mq` overlapping
    /// the interval. Each pair is reported once even if both mates overlap.
    pub fn supporting_pairs(
        &self,
        interval: &CandidateInterval,
        min_mq: u8,
    ) -> Vec<Arc<ReadPair>> {
        let mut support = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        self.collect(interval, min_mq, &mut seen, &mut support);
        support
    }

    /// Union of supporting pairs over an interval group, deduplicated.
    pub fn supporting_pairs_for_group(
        &self,
        intervals: &[CandidateInterval],
        min_mq: u8,
    ) -> Vec<Arc<ReadPair>> {
        let mut support = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for interval in intervals {
            self.collect(interval, min_mq, &mut seen, &mut support);
        }
        support
    }

    fn collect<'a>(
        &'a self,
        interval: &CandidateInterval,
        min_mq: u8,
        seen: &mut HashSet<&'a str>,
        support: &mut Vec<Arc<ReadPair>>,
    ) {
        let index = match self.by_contig.get(interval.contig()) {
            Some(index) => index,
            None => return,
        };
        // the leftmost entry that could still reach into the interval
        let from = interval.start().saturating_sub(index.max_span);
        let i = index.entries.partition_point(|(start, _, _, _)| *start < from);
        for (start, end, mapq, pair) in &index.entries[i..] {
            if *start >= interval.end() {
                break;
            }
            if *end > interval.start() && *mapq >= min_mq && seen.insert(pair.name.as_str()) {
                support.push(Arc::clone(pair));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{MateAlignment, SvTag};
    use crate::regions::RegionSet;

    fn pair(name: &str, c1: &str, start1: u64, c2: &str, start2: u64, mapq: u8) -> Arc<ReadPair> {
        let mate = |contig: &str, start: u64| MateAlignment {
            contig: contig.to_owned(),
            start,
            end: start + 100,
            mapq,
            mean_baseq: 30,
        };
        Arc::new(ReadPair::new(
            name.to_owned(),
            mate(c1, start1),
            mate(c2, start2),
            vec![SvTag::LongInsert],
        ))
    }

    fn interval(contig: &str, start: u64, end: u64) -> CandidateInterval {
        CandidateInterval::new(contig, start, end, 2, &RegionSet::default())
    }

    #[test]
    fn test_supporting_pairs_overlap_and_quality() {
        let pairs = vec![
            pair("in", "chr1", 1000, "chr1", 1200, 60),
            pair("mate_only", "chr2", 500, "chr1", 1250, 60),
            pair("low_mq", "chr1", 1000, "chr1", 1200, 5),
            pair("far", "chr1", 5000, "chr1", 5200, 60),
        ];
        let index = RecordIndex::new(&pairs);
        let support = index.supporting_pairs(&interval("chr1", 1100, 1300), 20);
        let mut names: Vec<&str> = support.iter().map(|p| p.name.as_str()).collect();
        names.sort_unstable();
        // recovers the pair with only one mate in the interval, drops low MQ
        assert_eq!(names, vec!["in", "mate_only"]);
    }

    #[test]
    fn test_pair_reported_once() {
        // both mates inside the interval
        let pairs = vec![pair("both", "chr1", 1000, "chr1", 1050, 60)];
        let index = RecordIndex::new(&pairs);
        let support = index.supporting_pairs(&interval("chr1", 900, 1300), 0);
        assert_eq!(support.len(), 1);
    }

    #[test]
    fn test_group_union() {
        let pairs = vec![
            pair("a", "chr2", 100, "chr8", 5000, 60),
            pair("b", "chr2", 120, "chr8", 5020, 60),
        ];
        let index = RecordIndex::new(&pairs);
        let group = vec![interval("chr2", 90, 250), interval("chr8", 4990, 5150)];
        let support = index.supporting_pairs_for_group(&group, 0);
        assert_eq!(support.len(), 2);
    }

    #[test]
    fn test_unknown_contig_is_empty() {
        let index = RecordIndex::new(&[]);
        assert!(index.supporting_pairs(&interval("chrUn", 0, 100), 0).is_empty());
    }
}
