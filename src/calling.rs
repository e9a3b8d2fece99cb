// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use itertools::Itertools;
use rayon::prelude::*;

use crate::candidates::{
    cluster_by_insert_size, coverage_counter, cross_contig_intervals, intervals_from_clusters,
    intervals_from_coverage, CandidateInterval,
};
use crate::errors::Error;
use crate::evidence::{Evidence, ReadPair, SvTag};
use crate::loci::{aggregate_locus, PutativeLocus, RearrangementType};
use crate::regions::RegionSet;
use crate::support::RecordIndex;

/// Numeric gates of the detection pipeline. Defaults preserve the empirically
/// chosen constants of the original caller; all of them are configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thresholds {
    pub min_mq: u8,
    pub min_bq: u8,
    pub min_cluster_depth: u32,
    pub min_pileup_len: u64,
    pub insert_distance: u64,
    pub bed_dist: u64,
    pub min_tdist: u64,
    pub merge_dist: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            min_mq: 0,
            min_bq: 0,
            min_cluster_depth: 5,
            min_pileup_len: 10,
            insert_distance: 35,
            bed_dist: 10_000,
            min_tdist: 50_000,
            merge_dist: 150,
        }
    }
}

/// Wall-clock budget for one detection run, checked at every per-contig task
/// boundary.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires: Option<Instant>,
    seconds: u64,
}

impl Deadline {
    pub fn new(budget: Option<Duration>) -> Self {
        Deadline {
            expires: budget.map(|b| Instant::now() + b),
            seconds: budget.map(|b| b.as_secs()).unwrap_or(0),
        }
    }

    pub fn unlimited() -> Self {
        Deadline::new(None)
    }

    pub fn check(&self) -> Result<(), Error> {
        match self.expires {
            Some(expires) if Instant::now() >= expires => Err(Error::DeadlineExceeded {
                seconds: self.seconds,
            }),
            _ => Ok(()),
        }
    }
}

/// One output row. Two lines with identical field values are the same call
/// and collapse on emission.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariantLine {
    pub contig: String,
    pub pos: u64,
    pub partner_contig: Option<String>,
    pub partner_pos: Option<u64>,
    pub rearrangement: RearrangementType,
    pub partner_count: u32,
    /// Inferred distance between the two breakpoints; intrachromosomal only.
    pub tdist: Option<u64>,
    pub source: String,
}

impl VariantLine {
    /// Derive the output record of a locus. `None` for a locus without any
    /// non-empty interval group.
    pub fn from_locus(locus: &PutativeLocus) -> Option<Self> {
        let primary = locus.primary_interval()?;
        match locus.rearrangement() {
            RearrangementType::Intrachromosomal => {
                let gaps: Vec<u64> = locus
                    .read_pairs()
                    .iter()
                    .filter(|pair| is_intra_partner(pair, primary))
                    .map(|pair| pair.inner_gap())
                    .collect();
                let tdist = if gaps.is_empty() {
                    0
                } else {
                    gaps.iter().sum::<u64>() / gaps.len() as u64
                };
                Some(VariantLine {
                    contig: primary.contig().to_owned(),
                    pos: primary.start(),
                    partner_contig: None,
                    partner_pos: None,
                    rearrangement: RearrangementType::Intrachromosomal,
                    partner_count: gaps.len() as u32,
                    tdist: Some(tdist),
                    source: locus.source().display().to_string(),
                })
            }
            RearrangementType::Interchromosomal => {
                let partner = locus.partner_interval();
                let partner_count = locus
                    .read_pairs()
                    .iter()
                    .filter(|pair| is_cross_partner(pair, primary, partner))
                    .count() as u32;
                Some(VariantLine {
                    contig: primary.contig().to_owned(),
                    pos: primary.start(),
                    partner_contig: partner.map(|p| p.contig().to_owned()),
                    partner_pos: partner.map(|p| p.start()),
                    rearrangement: RearrangementType::Interchromosomal,
                    partner_count,
                    tdist: None,
                    source: locus.source().display().to_string(),
                })
            }
        }
    }

    fn to_row(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.contig,
            self.pos,
            self.partner_contig.as_deref().unwrap_or("."),
            self.partner_pos
                .map(|p| p.to_string())
                .unwrap_or_else(|| ".".to_owned()),
            self.rearrangement,
            self.partner_count,
            self.tdist
                .map(|d| d.to_string())
                .unwrap_or_else(|| ".".to_owned()),
            self.source
        )
    }
}

/// A same-contig pair corroborates a second, distant breakpoint when exactly
/// one of its mates overlaps the primary interval and the mates do not touch.
fn is_intra_partner(pair: &ReadPair, primary: &CandidateInterval) -> bool {
    if !pair.is_same_contig() || pair.r1.contig != primary.contig() || pair.inner_gap() == 0 {
        return false;
    }
    let r1_in = pair.r1.overlaps(primary.contig(), primary.start(), primary.end());
    let r2_in = pair.r2.overlaps(primary.contig(), primary.start(), primary.end());
    r1_in != r2_in
}

fn is_cross_partner(
    pair: &ReadPair,
    primary: &CandidateInterval,
    partner: Option<&CandidateInterval>,
) -> bool {
    match partner {
        Some(partner) => {
            let (a, b) = pair.contig_pair();
            let mut contigs = [primary.contig(), partner.contig()];
            contigs.sort_unstable();
            a == contigs[0] && b == contigs[1] && a != b
        }
        None => false,
    }
}

/// Deduplicate, gate and write variant lines in encounter order. Returns the
/// number of emitted rows.
pub fn write_variant_lines<W: Write>(
    loci: &[PutativeLocus],
    min_tdist: u64,
    writer: &mut W,
) -> Result<usize> {
    let mut seen = HashSet::new();
    let mut n = 0;
    for locus in loci {
        if locus.segment_count() == 0 {
            warn!("void locus reached emission; skipped");
            continue;
        }
        let line = match VariantLine::from_locus(locus) {
            Some(line) => line,
            None => continue,
        };
        if !seen.insert(line.clone()) {
            continue;
        }
        let emit = match line.rearrangement {
            RearrangementType::Intrachromosomal => {
                line.partner_count != 0 && line.tdist.unwrap_or(0) >= min_tdist
            }
            // cross-contig distance is undefined, so no distance gate
            RearrangementType::Interchromosomal => line.partner_count != 0,
        };
        if emit {
            writeln!(writer, "{}", line.to_row()).context("error writing variant line")?;
            n += 1;
        }
    }
    Ok(n)
}

/// Run the full engine over loaded evidence: cluster, build candidate
/// intervals, re-collect support and aggregate loci, once for the
/// intrachromosomal and once for the interchromosomal signal. Contigs and
/// contig pairs are processed as independent parallel tasks over a shared
/// read-only record index.
pub fn detect_loci(
    evidence: &Evidence,
    regions: &Arc<RegionSet>,
    thresholds: &Thresholds,
    deadline: &Deadline,
) -> Result<Vec<PutativeLocus>> {
    let index = Arc::new(RecordIndex::new(evidence.all_pairs()));
    let mut loci = Vec::new();

    // intrachromosomal signal
    let intra_pairs: Vec<Arc<ReadPair>> = evidence
        .tagged_pairs(
            &[SvTag::LongInsert, SvTag::Orientation],
            thresholds.min_mq,
            thresholds.min_bq,
        )
        .into_iter()
        .filter(|pair| pair.is_same_contig())
        .collect();
    info!(
        "{} read pairs with intrachromosomal signal",
        intra_pairs.len()
    );
    let contigs: Vec<String> = intra_pairs
        .iter()
        .map(|pair| pair.r1.contig.clone())
        .unique()
        .sorted()
        .collect();

    let intra: Vec<Vec<PutativeLocus>> = contigs
        .par_iter()
        .map(|contig| {
            deadline.check()?;
            detect_intra_loci(contig, &intra_pairs, evidence, regions, &index, thresholds)
        })
        .collect::<Result<_>>()?;
    loci.extend(intra.into_iter().flatten());

    // interchromosomal signal
    let mut pair_groups: BTreeMap<(String, String), Vec<Arc<ReadPair>>> = BTreeMap::new();
    for pair in evidence
        .tagged_pairs(
            &[SvTag::CrossContig, SvTag::Orientation],
            thresholds.min_mq,
            thresholds.min_bq,
        )
        .into_iter()
        .filter(|pair| !pair.is_same_contig())
    {
        let key = pair.contig_pair();
        // unplaced scaffolds are uninformative for rearrangement calls
        if key.0.contains("GL") || key.1.contains("GL") {
            continue;
        }
        pair_groups.entry(key).or_default().push(pair);
    }
    info!("{} cross-contig pair groups", pair_groups.len());

    let pair_groups: Vec<((String, String), Vec<Arc<ReadPair>>)> =
        pair_groups.into_iter().collect();
    let inter: Vec<Vec<PutativeLocus>> = pair_groups
        .par_iter()
        .map(|(contig_pair, pairs)| {
            deadline.check()?;
            detect_inter_loci(contig_pair, pairs, evidence, regions, &index, thresholds)
        })
        .collect::<Result<_>>()?;
    loci.extend(inter.into_iter().flatten());

    Ok(loci)
}

fn detect_intra_loci(
    contig: &str,
    intra_pairs: &[Arc<ReadPair>],
    evidence: &Evidence,
    regions: &Arc<RegionSet>,
    index: &Arc<RecordIndex>,
    thresholds: &Thresholds,
) -> Result<Vec<PutativeLocus>> {
    let pairs: Vec<Arc<ReadPair>> = intra_pairs
        .iter()
        .filter(|pair| pair.r1.contig == contig)
        .cloned()
        .collect();
    let clusters = cluster_by_insert_size(contig, &pairs, thresholds.insert_distance);
    if clusters.is_empty() {
        return Ok(Vec::new());
    }
    let candidates = intervals_from_clusters(
        &clusters,
        regions,
        thresholds.min_cluster_depth,
        thresholds.min_pileup_len,
        thresholds.merge_dist,
    );
    debug!("{}: {} candidate intervals", contig, candidates.len());

    let mut found = Vec::new();
    for candidate in candidates {
        let support = index.supporting_pairs(&candidate, thresholds.min_mq);
        if support.is_empty() {
            // evidence absence, not an error
            continue;
        }
        let counter = coverage_counter(contig, &support);
        let group = intervals_from_coverage(
            &counter,
            contig,
            thresholds.min_cluster_depth,
            thresholds.min_pileup_len,
            thresholds.merge_dist,
            regions,
        );
        if let Some(locus) = aggregate_locus(
            vec![group],
            support,
            Arc::clone(regions),
            Arc::clone(evidence.header()),
            RearrangementType::Intrachromosomal,
            evidence.source(),
        ) {
            found.push(locus);
        }
    }
    Ok(found)
}

fn detect_inter_loci(
    contig_pair: &(String, String),
    pairs: &[Arc<ReadPair>],
    evidence: &Evidence,
    regions: &Arc<RegionSet>,
    index: &Arc<RecordIndex>,
    thresholds: &Thresholds,
) -> Result<Vec<PutativeLocus>> {
    let candidate_groups = match cross_contig_intervals(
        contig_pair,
        pairs,
        regions,
        thresholds.min_cluster_depth,
        thresholds.min_pileup_len,
        thresholds.merge_dist,
        thresholds.bed_dist,
    ) {
        Some(groups) => groups,
        None => return Ok(Vec::new()),
    };
    let candidates: Vec<CandidateInterval> =
        candidate_groups.into_iter().flatten().collect();
    let support = index.supporting_pairs_for_group(&candidates, thresholds.min_mq);
    if support.is_empty() {
        return Ok(Vec::new());
    }
    let mut groups = Vec::with_capacity(2);
    for contig in &[&contig_pair.0, &contig_pair.1] {
        let counter = coverage_counter(contig, &support);
        groups.push(intervals_from_coverage(
            &counter,
            contig,
            thresholds.min_cluster_depth,
            thresholds.min_pileup_len,
            thresholds.merge_dist,
            regions,
        ));
    }
    Ok(aggregate_locus(
        groups,
        support,
        Arc::clone(regions),
        Arc::clone(evidence.header()),
        RearrangementType::Interchromosomal,
        evidence.source(),
    )
    .into_iter()
    .collect())
}

/// Entry point for one detection run over an SV-tagged BAM. Construct via
/// `RearrangementDetectorBuilder`, then call `detect`.
#[derive(Builder, Debug)]
#[builder(pattern = "owned")]
pub struct RearrangementDetector {
    bam: PathBuf,
    target_regions: PathBuf,
    reference: PathBuf,
    #[builder(default)]
    output: Option<PathBuf>,
    #[builder(default)]
    thresholds: Thresholds,
    #[builder(default)]
    deadline: Option<Duration>,
}

impl RearrangementDetector {
    /// Detect rearrangements and write surviving variant lines to the output
    /// path, which is returned. Configuration errors are raised before any
    /// evidence is loaded.
    pub fn detect(&self) -> Result<PathBuf> {
        if !self.target_regions.exists() {
            return Err(Error::MissingTargetRegions {
                path: self.target_regions.clone(),
            }
            .into());
        }
        let fai = reference_index_path(&self.reference);
        if !fai.exists() {
            return Err(Error::MissingReferenceIndex { path: fai }.into());
        }

        let regions = Arc::new(RegionSet::from_bed(&self.target_regions)?);
        let evidence = Evidence::load(&self.bam)?;
        let deadline = Deadline::new(self.deadline);
        let loci = detect_loci(&evidence, &regions, &self.thresholds, &deadline)?;
        info!("{} putative loci aggregated", loci.len());

        let output = self
            .output
            .clone()
            .unwrap_or_else(|| self.bam.with_extension("putative_sv.txt"));
        let mut writer = BufWriter::new(File::create(&output).with_context(|| {
            format!("error creating output file {}", output.display())
        })?);
        let n = write_variant_lines(&loci, self.thresholds.min_tdist, &mut writer)?;
        info!(
            "{} putative rearrangements written to {}",
            n,
            output.display()
        );
        Ok(output)
    }
}

fn reference_index_path(reference: &Path) -> PathBuf {
    let mut fai = reference.as_os_str().to_owned();
    fai.push(".fai");
    PathBuf::from(fai)
}
