//! regions.rs
//!
//! Contig-scoped target (capture) regions parsed from a BED file, merged and
//! kept sorted for binary-search overlap and distance queries.

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use anyhow::{Context, Result};
use bio::io::bed;

use crate::errors::Error;

#[derive(Debug, Clone, Default)]
pub struct RegionSet {
    // per contig, sorted by start, non-overlapping after merge
    regions: HashMap<String, Vec<Range<u64>>>,
}

impl RegionSet {
    /// Parse a BED file into a merged region set. A malformed record is a
    /// fatal parse error, not a skip.
    pub fn from_bed(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = bed::Reader::from_file(path)
            .with_context(|| format!("error opening BED file {}", path.display()))?;
        let mut regions: HashMap<String, Vec<Range<u64>>> = HashMap::new();
        let mut n = 0;
        for (i, result) in reader.records().enumerate() {
            let record = result.map_err(|e| Error::InvalidBedRecord {
                path: path.to_owned(),
                line: i + 1,
                msg: e.to_string(),
            })?;
            if record.end() < record.start() {
                return Err(Error::InvertedBedRecord {
                    path: path.to_owned(),
                    line: i + 1,
                }
                .into());
            }
            regions
                .entry(record.chrom().to_owned())
                .or_default()
                .push(record.start()..record.end());
            n += 1;
        }
        if n == 0 {
            return Err(Error::EmptyTargetRegions {
                path: path.to_owned(),
            }
            .into());
        }
        info!("{} target regions loaded from {}", n, path.display());
        Ok(RegionSet::from_ranges(regions))
    }

    /// Build a region set from raw per-contig ranges, merging overlapping and
    /// adjacent ones.
    pub fn from_ranges(mut regions: HashMap<String, Vec<Range<u64>>>) -> Self {
        for ranges in regions.values_mut() {
            ranges.sort_by_key(|r| (r.start, r.end));
            let mut merged: Vec<Range<u64>> = Vec::with_capacity(ranges.len());
            for range in ranges.drain(..) {
                match merged.last_mut() {
                    Some(last) if range.start <= last.end => {
                        last.end = last.end.max(range.end);
                    }
                    _ => merged.push(range),
                }
            }
            *ranges = merged;
        }
        RegionSet { regions }
    }

    /// Does any target region on `contig` intersect `[start, end)`?
    pub fn overlaps(&self, contig: &str, start: u64, end: u64) -> bool {
        match self.regions.get(contig) {
            Some(ranges) => {
                // first region ending after the query start
                let i = ranges.partition_point(|r| r.end <= start);
                i < ranges.len() && ranges[i].start < end
            }
            None => false,
        }
    }

    /// Distance from `[start, end)` to the closest target region on `contig`
    /// (0 on overlap), or `None` if the contig carries no target region.
    pub fn distance(&self, contig: &str, start: u64, end: u64) -> Option<u64> {
        let ranges = self.regions.get(contig)?;
        if ranges.is_empty() {
            return None;
        }
        // first region starting at or after the query end
        let i = ranges.partition_point(|r| r.start < end);
        let mut best = None;
        if i < ranges.len() {
            best = Some(ranges[i].start.saturating_sub(end));
        }
        if i > 0 {
            let left = &ranges[i - 1];
            let d = if left.end > start {
                0
            } else {
                start - left.end
            };
            best = Some(match best {
                Some(b) => b.min(d),
                None => d,
            });
        }
        best
    }

    pub fn is_empty(&self) -> bool {
        self.regions.values().all(|r| r.is_empty())
    }
}
