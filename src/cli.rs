// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use structopt::StructOpt;

use crate::calling::{RearrangementDetectorBuilder, Thresholds};

#[derive(Debug, StructOpt, Serialize, Deserialize, Clone)]
#[structopt(
    name = "translociraptor",
    about = "A caller for putative intra- and interchromosomal rearrangements from SV-tagged alignments."
)]
pub enum Translociraptor {
    #[structopt(
        name = "detect",
        about = "Detect rearrangement loci from a name-sorted BAM whose reads carry SV evidence tags."
    )]
    Detect {
        #[structopt(
            parse(from_os_str),
            help = "BAM file with SV-tagged reads. Name sorting required."
        )]
        bam: PathBuf,
        #[structopt(
            parse(from_os_str),
            long = "bed",
            help = "Capture BED file with target regions. Required for rearrangement detection."
        )]
        bed: PathBuf,
        #[structopt(
            parse(from_os_str),
            long,
            help = "Reference FASTA. Has to be indexed with samtools faidx."
        )]
        reference: PathBuf,
        #[structopt(
            parse(from_os_str),
            long,
            help = "Output path for putative variant lines (default: <bam>.putative_sv.txt)."
        )]
        output: Option<PathBuf>,
        #[structopt(long = "min-mq", default_value = "0", help = "Minimum mapping quality.")]
        min_mq: u8,
        #[structopt(
            long = "min-bq",
            default_value = "0",
            help = "Minimum mean base quality. Not recommended for rearrangement calls."
        )]
        min_bq: u8,
        #[structopt(
            long = "min-cluster-depth",
            default_value = "5",
            help = "Minimum number of read pairs supporting a breakpoint cluster."
        )]
        min_cluster_depth: u32,
        #[structopt(
            long = "min-pileup-len",
            default_value = "10",
            help = "Minimum length of a candidate interval."
        )]
        min_pileup_len: u64,
        #[structopt(
            long = "insert-distance",
            default_value = "35",
            help = "Maximum difference between inferred breakpoint offsets within one cluster."
        )]
        insert_distance: u64,
        #[structopt(
            long = "bed-dist",
            default_value = "10000",
            help = "Maximum distance of an interchromosomal candidate interval from a target region."
        )]
        bed_dist: u64,
        #[structopt(
            long = "min-tdist",
            default_value = "50000",
            help = "Minimum inter-breakpoint distance of an intrachromosomal call. Screens out \
                    short-range artifacts such as local indels masquerading as rearrangement \
                    signal."
        )]
        min_tdist: u64,
        #[structopt(
            long = "merge-dist",
            default_value = "150",
            help = "Merge distance for adjacent candidate intervals."
        )]
        merge_dist: u64,
        #[structopt(long, short = "t", default_value = "1", help = "Number of threads to use.")]
        threads: usize,
        #[structopt(
            long,
            help = "Abort with an error if detection has not finished after this many seconds."
        )]
        deadline: Option<u64>,
        #[structopt(long, short = "v", help = "Verbose (debug) logging.")]
        verbose: bool,
    },
}

impl Translociraptor {
    pub fn verbose(&self) -> bool {
        match self {
            Translociraptor::Detect { verbose, .. } => *verbose,
        }
    }
}

pub fn run(opt: Translociraptor) -> Result<()> {
    match opt {
        Translociraptor::Detect {
            bam,
            bed,
            reference,
            output,
            min_mq,
            min_bq,
            min_cluster_depth,
            min_pileup_len,
            insert_distance,
            bed_dist,
            min_tdist,
            merge_dist,
            threads,
            deadline,
            verbose: _,
        } => {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()?;
            let detector = RearrangementDetectorBuilder::default()
                .bam(bam)
                .target_regions(bed)
                .reference(reference)
                .output(output)
                .thresholds(Thresholds {
                    min_mq,
                    min_bq,
                    min_cluster_depth,
                    min_pileup_len,
                    insert_distance,
                    bed_dist,
                    min_tdist,
                    merge_dist,
                })
                .deadline(deadline.map(Duration::from_secs))
                .build()?;
            let output = detector.detect()?;
            info!("Putative rearrangements written to {}", output.display());
        }
    }
    Ok(())
}
