// Copyright 2020 Johannes Köster.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

pub mod cluster;
pub mod intervals;

pub use self::cluster::{cluster_by_insert_size, Cluster};
pub use self::intervals::{
    coverage_counter, cross_contig_intervals, intervals_from_clusters, intervals_from_coverage,
    CandidateInterval,
};
