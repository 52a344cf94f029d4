// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Slurm CLI integration for GPU accounting.
//!
//! Two independent queries feed every poll:
//! - `sinfo`: GPU inventory per node (cluster total)
//! - `sacct`: GPUs held by running jobs (allocated total and per-user split)
//!
//! The queries run one after the other, not atomically, so their results can
//! disagree by whatever changed in between.

pub mod command;
pub mod sacct;
pub mod sinfo;

pub use command::{CommandRunner, SystemRunner};
pub use sacct::{query_allocated_gpus, AllocatedGpus};
pub use sinfo::query_total_gpus;

/// Which binaries to invoke for each query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlurmQueries {
    pub sinfo: String,
    pub sacct: String,
}

impl Default for SlurmQueries {
    fn default() -> Self {
        Self {
            sinfo: "sinfo".to_string(),
            sacct: "sacct".to_string(),
        }
    }
}

/// Parse a GPU quantity, rejecting anything that isn't a finite non-negative number
fn parse_gpu_count(value: &str) -> Option<f64> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
}
