// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

#[macro_use]
extern crate log;
#[macro_use]
extern crate derive_builder;
#[macro_use]
extern crate serde_derive;

pub mod calling;
pub mod candidates;
pub mod cli;
pub mod errors;
pub mod evidence;
pub mod loci;
pub mod regions;
pub mod support;

pub use crate::calling::{RearrangementDetector, RearrangementDetectorBuilder, Thresholds};
