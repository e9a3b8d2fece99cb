// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use getset::{CopyGetters, Getters};
use strum_macros::{Display, EnumString};

use crate::candidates::intervals::CandidateInterval;
use crate::evidence::{AlignmentHeader, ReadPair};
use crate::regions::RegionSet;

#[derive(Display, EnumString, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RearrangementType {
    #[strum(serialize = "IntrachromosomalRearrangement")]
    Intrachromosomal,
    #[strum(serialize = "InterchromosomalRearrangement")]
    Interchromosomal,
}

/// A putative rearrangement locus: candidate intervals (one group for
/// intrachromosomal loci, one group per participating contig otherwise) and
/// the read pairs supporting them.
#[derive(Getters, CopyGetters, Debug, Clone)]
pub struct PutativeLocus {
    #[getset(get = "pub")]
    interval_groups: Vec<Vec<CandidateInterval>>,
    #[getset(get = "pub")]
    read_pairs: Vec<Arc<ReadPair>>,
    #[getset(get = "pub")]
    regions: Arc<RegionSet>,
    #[getset(get = "pub")]
    header: Arc<AlignmentHeader>,
    #[getset(get_copy = "pub")]
    rearrangement: RearrangementType,
    #[getset(get = "pub")]
    source: PathBuf,
}

impl PutativeLocus {
    /// Number of non-empty interval groups. The aggregator never constructs a
    /// locus where this is zero.
    pub fn segment_count(&self) -> usize {
        self.interval_groups
            .iter()
            .filter(|group| !group.is_empty())
            .count()
    }

    /// The first interval of the first non-empty group.
    pub fn primary_interval(&self) -> Option<&CandidateInterval> {
        self.interval_groups
            .iter()
            .flat_map(|group| group.first())
            .next()
    }

    /// The first interval of the second non-empty group (the partner contig
    /// of an interchromosomal locus).
    pub fn partner_interval(&self) -> Option<&CandidateInterval> {
        self.interval_groups
            .iter()
            .filter(|group| !group.is_empty())
            .nth(1)
            .and_then(|group| group.first())
    }
}

/// Combine candidate intervals and their supporting read pairs into a locus.
/// Returns `None` if every interval group is empty: such a locus is void and
/// must never be constructed.
pub fn aggregate_locus(
    interval_groups: Vec<Vec<CandidateInterval>>,
    read_pairs: Vec<Arc<ReadPair>>,
    regions: Arc<RegionSet>,
    header: Arc<AlignmentHeader>,
    rearrangement: RearrangementType,
    source: &Path,
) -> Option<PutativeLocus> {
    if interval_groups.iter().all(|group| group.is_empty()) {
        debug!("skipping void {} locus without intervals", rearrangement);
        return None;
    }
    Some(PutativeLocus {
        interval_groups,
        read_pairs,
        regions,
        header,
        rearrangement,
        source: source.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regions::RegionSet;

    fn interval(contig: &str, start: u64, end: u64) -> CandidateInterval {
        CandidateInterval::new(contig, start, end, 2, &RegionSet::default())
    }

    #[test]
    fn test_void_locus_is_never_constructed() {
        let locus = aggregate_locus(
            vec![vec![], vec![]],
            vec![],
            Arc::new(RegionSet::default()),
            Arc::new(AlignmentHeader::default()),
            RearrangementType::Interchromosomal,
            Path::new("test.bam"),
        );
        assert!(locus.is_none());
    }

    #[test]
    fn test_segment_count_skips_empty_groups() {
        let locus = aggregate_locus(
            vec![vec![interval("chr2", 100, 200)], vec![]],
            vec![],
            Arc::new(RegionSet::default()),
            Arc::new(AlignmentHeader::default()),
            RearrangementType::Interchromosomal,
            Path::new("test.bam"),
        )
        .unwrap();
        assert_eq!(locus.segment_count(), 1);
        assert_eq!(locus.primary_interval().unwrap().contig(), "chr2");
        assert!(locus.partner_interval().is_none());
    }

    #[test]
    fn test_partner_interval() {
        let locus = aggregate_locus(
            vec![
                vec![interval("chr2", 100, 200)],
                vec![interval("chr8", 5000, 5100)],
            ],
            vec![],
            Arc::new(RegionSet::default()),
            Arc::new(AlignmentHeader::default()),
            RearrangementType::Interchromosomal,
            Path::new("test.bam"),
        )
        .unwrap();
        assert_eq!(locus.segment_count(), 2);
        assert_eq!(locus.partner_interval().unwrap().contig(), "chr8");
    }

    #[test]
    fn test_rearrangement_type_spelling() {
        assert_eq!(
            RearrangementType::Intrachromosomal.to_string(),
            "IntrachromosomalRearrangement"
        );
        assert_eq!(
            "InterchromosomalRearrangement"
                .parse::<RearrangementType>()
                .unwrap(),
            RearrangementType::Interchromosomal
        );
    }
}
