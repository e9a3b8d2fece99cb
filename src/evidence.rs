// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str;
use std::sync::Arc;

use anyhow::{Context, Result};
use rust_htslib::bam::{self, record::Aux, Read};
use strum_macros::{Display, EnumString};

/// SV evidence tag attached to an alignment by the tagging pipeline
/// (comma-joined in the `SV:Z:` aux field).
#[derive(Display, EnumString, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SvTag {
    /// Fragment span exceeds the expected insert size (intrachromosomal signal).
    #[strum(serialize = "LI")]
    LongInsert,
    /// Mates map to different contigs (interchromosomal signal).
    #[strum(serialize = "MDC")]
    CrossContig,
    /// Discordant mate orientation.
    #[strum(serialize = "ORB")]
    Orientation,
}

/// One aligned mate of a sequenced fragment. Coordinates are 0-based, half-open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MateAlignment {
    pub contig: String,
    pub start: u64,
    pub end: u64,
    pub mapq: u8,
    pub mean_baseq: u8,
}

impl MateAlignment {
    pub fn overlaps(&self, contig: &str, start: u64, end: u64) -> bool {
        self.contig == contig && self.start < end && self.end > start
    }
}

/// Two mates from one sequencing fragment, together with their SV evidence tags.
/// Loaded once per run and shared read-only (`Arc`) by clusters and support sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPair {
    pub name: String,
    pub r1: MateAlignment,
    pub r2: MateAlignment,
    pub tags: Vec<SvTag>,
}

impl ReadPair {
    /// Mates are stored ordered by (contig, start), so `r1` is the leftmost
    /// mate on same-contig pairs.
    pub fn new(name: String, a: MateAlignment, b: MateAlignment, tags: Vec<SvTag>) -> Self {
        let (r1, r2) = if (&a.contig, a.start) <= (&b.contig, b.start) {
            (a, b)
        } else {
            (b, a)
        };
        ReadPair { name, r1, r2, tags }
    }

    pub fn is_same_contig(&self) -> bool {
        self.r1.contig == self.r2.contig
    }

    pub fn has_tags(&self, filter: &[SvTag]) -> bool {
        filter.iter().all(|tag| self.tags.contains(tag))
    }

    /// Inferred breakpoint offset of a same-contig pair: the genomic span
    /// covered by the whole fragment.
    pub fn fragment_span(&self) -> u64 {
        self.r2.end.max(self.r1.end).saturating_sub(self.r1.start)
    }

    /// Gap between the inner ends of the two mates (0 for overlapping mates).
    pub fn inner_gap(&self) -> u64 {
        self.r2.start.saturating_sub(self.r1.end)
    }

    /// The unordered pair of contigs the mates map to, lexicographically sorted.
    pub fn contig_pair(&self) -> (String, String) {
        (self.r1.contig.clone(), self.r2.contig.clone())
    }

    fn passes(&self, min_mq: u8, min_bq: u8) -> bool {
        self.r1.mapq >= min_mq
            && self.r2.mapq >= min_mq
            && self.r1.mean_baseq >= min_bq
            && self.r2.mean_baseq >= min_bq
    }
}

/// Contig names and lengths from the alignment file header.
#[derive(Debug, Clone, Default)]
pub struct AlignmentHeader {
    pub contigs: Vec<(String, u64)>,
}

impl AlignmentHeader {
    fn from_header_view(header: &bam::HeaderView) -> Result<Self> {
        let mut contigs = Vec::with_capacity(header.target_count() as usize);
        for tid in 0..header.target_count() {
            let name = str::from_utf8(header.tid2name(tid))
                .context("invalid UTF-8 in BAM contig name")?
                .to_owned();
            let len = header.target_len(tid).unwrap_or(0);
            contigs.push((name, len));
        }
        Ok(AlignmentHeader { contigs })
    }
}

/// The full record set of one alignment file, materialized as read pairs.
///
/// This is the immutable snapshot all downstream stages operate on; SV-tagged
/// subsets are selected from it without re-reading the file.
#[derive(Debug, Clone)]
pub struct Evidence {
    all_pairs: Vec<Arc<ReadPair>>,
    header: Arc<AlignmentHeader>,
    source: PathBuf,
}

impl Evidence {
    /// Load every mapped primary read pair from a name-sorted, SV-tagged BAM.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = bam::Reader::from_path(path)
            .with_context(|| format!("error opening BAM file {}", path.display()))?;
        let header = Arc::new(AlignmentHeader::from_header_view(reader.header())?);
        let header_view = reader.header().clone();

        let mut pending: HashMap<Vec<u8>, bam::Record> = HashMap::new();
        let mut all_pairs = Vec::new();
        for result in reader.records() {
            let record = result.context("error reading BAM record")?;
            if record.is_unmapped()
                || record.is_mate_unmapped()
                || record.is_secondary()
                || record.is_supplementary()
                || !record.is_paired()
            {
                continue;
            }
            match pending.remove(record.qname()) {
                Some(mate) => {
                    all_pairs.push(Arc::new(read_pair(&header_view, &mate, &record)?));
                }
                None => {
                    pending.insert(record.qname().to_owned(), record);
                }
            }
        }
        if !pending.is_empty() {
            debug!("{} records without a primary mate skipped", pending.len());
        }
        info!("{} read pairs loaded from {}", all_pairs.len(), path.display());

        Ok(Evidence {
            all_pairs,
            header,
            source: path.to_owned(),
        })
    }

    /// Build evidence from an in-memory pair set (testing and library use).
    pub fn from_pairs(pairs: Vec<ReadPair>, source: impl AsRef<Path>) -> Self {
        Evidence {
            all_pairs: pairs.into_iter().map(Arc::new).collect(),
            header: Arc::new(AlignmentHeader::default()),
            source: source.as_ref().to_owned(),
        }
    }

    /// Read pairs carrying all requested SV tags and passing the quality floors.
    pub fn tagged_pairs(&self, filter: &[SvTag], min_mq: u8, min_bq: u8) -> Vec<Arc<ReadPair>> {
        self.all_pairs
            .iter()
            .filter(|pair| pair.has_tags(filter) && pair.passes(min_mq, min_bq))
            .cloned()
            .collect()
    }

    pub fn all_pairs(&self) -> &[Arc<ReadPair>] {
        &self.all_pairs
    }

    pub fn header(&self) -> &Arc<AlignmentHeader> {
        &self.header
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

fn read_pair(
    header: &bam::HeaderView,
    first: &bam::Record,
    second: &bam::Record,
) -> Result<ReadPair> {
    let mut tags = sv_tags(first);
    for tag in sv_tags(second) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    Ok(ReadPair::new(
        str::from_utf8(first.qname())
            .context("invalid UTF-8 in read name")?
            .to_owned(),
        mate_alignment(header, first)?,
        mate_alignment(header, second)?,
        tags,
    ))
}

fn mate_alignment(header: &bam::HeaderView, record: &bam::Record) -> Result<MateAlignment> {
    let contig = str::from_utf8(header.tid2name(record.tid() as u32))
        .context("invalid UTF-8 in BAM contig name")?
        .to_owned();
    Ok(MateAlignment {
        contig,
        start: record.pos() as u64,
        end: record.cigar().end_pos() as u64,
        mapq: record.mapq(),
        mean_baseq: mean_baseq(record.qual()),
    })
}

fn mean_baseq(quals: &[u8]) -> u8 {
    if quals.is_empty() {
        return 0;
    }
    (quals.iter().map(|&q| q as u64).sum::<u64>() / quals.len() as u64) as u8
}

/// Parse the comma-joined `SV:Z:` aux field. Tags other than the three SV
/// evidence signals are ignored.
fn sv_tags(record: &bam::Record) -> Vec<SvTag> {
    match record.aux(b"SV") {
        Ok(Aux::String(value)) => value
            .split(',')
            .filter_map(|token| token.parse::<SvTag>().ok())
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mate(contig: &str, start: u64, end: u64) -> MateAlignment {
        MateAlignment {
            contig: contig.to_owned(),
            start,
            end,
            mapq: 60,
            mean_baseq: 30,
        }
    }

    #[test]
    fn test_read_pair_orders_mates() {
        let pair = ReadPair::new(
            "frag1".to_owned(),
            mate("chr1", 1200, 1300),
            mate("chr1", 1000, 1100),
            vec![SvTag::LongInsert],
        );
        assert_eq!(pair.r1.start, 1000);
        assert_eq!(pair.r2.start, 1200);
        assert_eq!(pair.fragment_span(), 300);
        assert_eq!(pair.inner_gap(), 100);
    }

    #[test]
    fn test_cross_contig_pair() {
        let pair = ReadPair::new(
            "frag2".to_owned(),
            mate("chr8", 500, 600),
            mate("chr2", 100, 200),
            vec![SvTag::CrossContig],
        );
        assert!(!pair.is_same_contig());
        assert_eq!(
            pair.contig_pair(),
            ("chr2".to_owned(), "chr8".to_owned())
        );
    }

    #[test]
    fn test_tag_filter_requires_all() {
        let pair = ReadPair::new(
            "frag3".to_owned(),
            mate("chr1", 0, 100),
            mate("chr1", 400, 500),
            vec![SvTag::LongInsert, SvTag::Orientation],
        );
        assert!(pair.has_tags(&[SvTag::LongInsert]));
        assert!(pair.has_tags(&[SvTag::LongInsert, SvTag::Orientation]));
        assert!(!pair.has_tags(&[SvTag::CrossContig, SvTag::Orientation]));
    }

    #[test]
    fn test_sv_tag_spelling() {
        assert_eq!("LI".parse::<SvTag>().unwrap(), SvTag::LongInsert);
        assert_eq!("MDC".parse::<SvTag>().unwrap(), SvTag::CrossContig);
        assert_eq!("ORB".parse::<SvTag>().unwrap(), SvTag::Orientation);
        assert!("XX".parse::<SvTag>().is_err());
        assert_eq!(SvTag::LongInsert.to_string(), "LI");
    }

    #[test]
    fn test_tagged_pairs_quality_floor() {
        let mut low = mate("chr1", 0, 100);
        low.mapq = 10;
        let pairs = vec![
            ReadPair::new(
                "pass".to_owned(),
                mate("chr1", 0, 100),
                mate("chr1", 300, 400),
                vec![SvTag::LongInsert],
            ),
            ReadPair::new(
                "fail".to_owned(),
                low,
                mate("chr1", 300, 400),
                vec![SvTag::LongInsert],
            ),
        ];
        let evidence = Evidence::from_pairs(pairs, "test.bam");
        let tagged = evidence.tagged_pairs(&[SvTag::LongInsert], 20, 0);
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].name, "pass");
        // the unfiltered set keeps both
        assert_eq!(evidence.all_pairs().len(), 2);
    }
}
