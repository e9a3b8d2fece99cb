// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::sync::Arc;

use getset::Getters;

use crate::evidence::ReadPair;

/// A set of same-contig read pairs whose inferred breakpoint offsets lie
/// within the clustering distance of each other.
#[derive(Debug, Clone, Getters)]
pub struct Cluster {
    #[getset(get = "pub")]
    contig: String,
    #[getset(get = "pub")]
    pairs: Vec<Arc<ReadPair>>,
}

impl Cluster {
    pub fn depth(&self) -> u32 {
        self.pairs.len() as u32
    }

    /// Genomic span covered by all mates of the cluster.
    pub fn span(&self) -> (u64, u64) {
        let start = self
            .pairs
            .iter()
            .map(|pair| pair.r1.start)
            .min()
            .unwrap_or(0);
        let end = self
            .pairs
            .iter()
            .map(|pair| pair.r2.end.max(pair.r1.end))
            .max()
            .unwrap_or(start);
        (start, end)
    }
}

/// Partition one contig's read pairs into breakpoint-proximity clusters by
/// single linkage over the inferred fragment span: neighbors at most
/// `insert_distance` apart end up in the same cluster, and a pair with no
/// close neighbor forms a singleton. An empty input yields an empty list.
///
/// Grouping by contig is the caller's responsibility.
pub fn cluster_by_insert_size(
    contig: &str,
    pairs: &[Arc<ReadPair>],
    insert_distance: u64,
) -> Vec<Cluster> {
    let mut sorted: Vec<&Arc<ReadPair>> = pairs.iter().collect();
    sorted.sort_by(|a, b| {
        (a.fragment_span(), a.r1.start, &a.name).cmp(&(b.fragment_span(), b.r1.start, &b.name))
    });

    let mut clusters = Vec::new();
    let mut current: Vec<Arc<ReadPair>> = Vec::new();
    let mut last_span = 0;
    for pair in sorted {
        let span = pair.fragment_span();
        if !current.is_empty() && span - last_span > insert_distance {
            clusters.push(Cluster {
                contig: contig.to_owned(),
                pairs: std::mem::take(&mut current),
            });
        }
        current.push(Arc::clone(pair));
        last_span = span;
    }
    if !current.is_empty() {
        clusters.push(Cluster {
            contig: contig.to_owned(),
            pairs: current,
        });
    }
    debug!(
        "{}: {} read pairs clustered into {} insert size clusters",
        contig,
        pairs.len(),
        clusters.len()
    );
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::{MateAlignment, SvTag};

    fn pair(name: &str, start1: u64, start2: u64) -> Arc<ReadPair> {
        let mate = |start: u64| MateAlignment {
            contig: "chr1".to_owned(),
            start,
            end: start + 100,
            mapq: 60,
            mean_baseq: 30,
        };
        Arc::new(ReadPair::new(
            name.to_owned(),
            mate(start1),
            mate(start2),
            vec![SvTag::LongInsert],
        ))
    }

    #[test]
    fn test_empty_input() {
        assert!(cluster_by_insert_size("chr1", &[], 35).is_empty());
    }

    #[test]
    fn test_close_pairs_group() {
        let pairs = vec![pair("a", 1000, 1200), pair("b", 1010, 1210)];
        let clusters = cluster_by_insert_size("chr1", &pairs, 35);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].depth(), 2);
        assert_eq!(clusters[0].span(), (1000, 1310));
    }

    #[test]
    fn test_distant_pair_is_singleton() {
        // spans 300, 300 and 1100
        let pairs = vec![pair("a", 1000, 1200), pair("b", 1010, 1210), pair("c", 1000, 2000)];
        let clusters = cluster_by_insert_size("chr1", &pairs, 35);
        assert_eq!(clusters.len(), 2);
        let sizes: Vec<u32> = clusters.iter().map(Cluster::depth).collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[test]
    fn test_partition_property() {
        let pairs: Vec<_> = (0..50)
            .map(|i| pair(&format!("p{}", i), 1000 + i * 7, 1300 + i * 13))
            .collect();
        let clusters = cluster_by_insert_size("chr1", &pairs, 35);
        let total: usize = clusters.iter().map(|c| c.pairs().len()).sum();
        assert_eq!(total, pairs.len());
        // no pair appears in two clusters
        let mut names: Vec<&str> = clusters
            .iter()
            .flat_map(|c| c.pairs().iter().map(|p| p.name.as_str()))
            .collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), pairs.len());
    }

    #[test]
    fn test_insert_distance_monotonicity() {
        let pairs: Vec<_> = (0..30)
            .map(|i| pair(&format!("p{}", i), 1000, 1100 + i * 20))
            .collect();
        let mut last_count = usize::MAX;
        for insert_distance in &[5, 20, 40, 400] {
            let clusters = cluster_by_insert_size("chr1", &pairs, *insert_distance);
            assert!(clusters.len() <= last_count);
            last_count = clusters.len();
        }
    }
}
