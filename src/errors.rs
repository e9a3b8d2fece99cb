use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("capture BED file {path} required for rearrangement detection does not exist")]
    MissingTargetRegions { path: PathBuf },
    #[error("reference FASTA index {path} not found; index the reference with samtools faidx")]
    MissingReferenceIndex { path: PathBuf },
    #[error("invalid BED record in {path} at line {line}: {msg}")]
    InvalidBedRecord {
        path: PathBuf,
        line: usize,
        msg: String,
    },
    #[error("BED record in {path} at line {line} has end < start")]
    InvertedBedRecord { path: PathBuf, line: usize },
    #[error("no target regions found in {path}")]
    EmptyTargetRegions { path: PathBuf },
    #[error("deadline of {seconds}s exceeded before all contigs were processed")]
    DeadlineExceeded { seconds: u64 },
}
