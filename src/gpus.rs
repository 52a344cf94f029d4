// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Cluster-wide GPU snapshot built from one `sinfo` and one `sacct` run.

use std::collections::HashMap;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::slurm::{query_allocated_gpus, query_total_gpus, AllocatedGpus, CommandRunner, SlurmQueries};

/// GPU accounting for a single poll.
///
/// `idle` and `utilization` are derived and never clamped: if the two
/// queries disagree, `idle` goes negative and `utilization` exceeds 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuSnapshot {
    pub alloc: f64,
    pub idle: f64,
    pub total: f64,
    pub utilization: f64,
    pub user_alloc: HashMap<String, f64>,
}

impl GpuSnapshot {
    pub fn new(total: f64, allocated: AllocatedGpus) -> Self {
        let alloc = allocated.total;
        let utilization = if total > 0.0 { alloc / total } else { 0.0 };
        Self {
            alloc,
            idle: total - alloc,
            total,
            utilization,
            user_alloc: allocated.per_user,
        }
    }
}

/// Query Slurm and build a fresh snapshot
pub fn collect_snapshot<R: CommandRunner + ?Sized>(runner: &R, queries: &SlurmQueries) -> Result<GpuSnapshot> {
    let start = Instant::now();
    let total = query_total_gpus(runner, &queries.sinfo)?;
    let allocated = query_allocated_gpus(runner, &queries.sacct)?;
    let snapshot = GpuSnapshot::new(total, allocated);

    debug!(
        total = snapshot.total,
        alloc = snapshot.alloc,
        users = snapshot.user_alloc.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "collected GPU snapshot"
    );

    Ok(snapshot)
}
