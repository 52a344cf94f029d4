// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Per-user GPU allocation from `sacct`.
//!
//! Output is one running job per line in parsable2 format: `<user>|<AllocTRES>`,
//! where AllocTRES is a comma-separated list such as
//! `billing=8,cpu=8,gres/gpu=2,mem=64G,node=1`.

use std::collections::HashMap;

use super::command::CommandRunner;
use super::parse_gpu_count;
use crate::error::Result;

/// All users, allocation only, running jobs, no header, `|`-separated
pub const SACCT_ARGS: [&str; 6] = [
    "-a",
    "-X",
    "--format=User,AllocTRES",
    "--state=RUNNING",
    "--noheader",
    "--parsable2",
];

const GPU_TRES_PREFIX: &str = "gres/gpu=";

/// GPUs held by one running job
#[derive(Debug, Clone, PartialEq)]
pub struct JobGpus {
    pub user: String,
    pub gpus: f64,
}

/// Allocation totals across all running jobs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocatedGpus {
    /// Sum of all parsed `gres/gpu=` quantities
    pub total: f64,
    /// Summed allocation per user
    pub per_user: HashMap<String, f64>,
}

impl AllocatedGpus {
    /// Add one job's GPUs to both the user's and the grand total
    pub fn add(&mut self, job: JobGpus) {
        self.total += job.gpus;
        *self.per_user.entry(job.user).or_insert(0.0) += job.gpus;
    }
}

/// Parse one `sacct` line.
///
/// Returns `None` for malformed lines and for jobs without any parseable
/// `gres/gpu=` token, so users holding no GPUs never show up.
pub fn parse_job_line(line: &str) -> Option<JobGpus> {
    let line = line.trim_matches('"');
    let mut fields = line.split('|');
    let user = fields.next()?.trim();
    let tres = fields.next()?.trim();
    if user.is_empty() || tres.is_empty() {
        return None;
    }

    let mut gpus: Option<f64> = None;
    for token in tres.split(',').map(str::trim) {
        // A bad count drops only this token
        if let Some(count) = token.strip_prefix(GPU_TRES_PREFIX).and_then(parse_gpu_count) {
            *gpus.get_or_insert(0.0) += count;
        }
    }

    Some(JobGpus {
        user: user.to_string(),
        gpus: gpus?,
    })
}

/// Aggregate every running job in `sacct` output
pub fn parse_allocated_gpus(output: &str) -> AllocatedGpus {
    let mut allocated = AllocatedGpus::default();
    for job in output.lines().filter_map(parse_job_line) {
        allocated.add(job);
    }
    allocated
}

/// Run `sacct` and return the allocation breakdown
pub fn query_allocated_gpus<R: CommandRunner + ?Sized>(runner: &R, program: &str) -> Result<AllocatedGpus> {
    let args: Vec<String> = SACCT_ARGS.iter().map(|s| s.to_string()).collect();
    let stdout = runner.run(program, &args)?;
    Ok(parse_allocated_gpus(&String::from_utf8_lossy(&stdout)))
}
