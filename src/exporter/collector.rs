// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Prometheus collector publishing one fresh GPU snapshot per scrape.

use prometheus::core::{Collector, Desc, Describer};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, GaugeVec, Opts};
use tracing::warn;

use crate::error::Result;
use crate::gpus::{collect_snapshot, GpuSnapshot};
use crate::slurm::{CommandRunner, SlurmQueries, SystemRunner};

const USER_LABEL: &str = "user";

/// Metric options; descriptors are derived from these once at construction
struct GaugeOpts {
    alloc: Opts,
    idle: Opts,
    total: Opts,
    utilization: Opts,
    user_alloc: Opts,
}

impl GaugeOpts {
    fn new() -> Self {
        Self {
            alloc: Opts::new("slurm_gpus_alloc", "Allocated GPUs"),
            idle: Opts::new("slurm_gpus_idle", "Idle GPUs"),
            total: Opts::new("slurm_gpus_total", "Total GPUs"),
            utilization: Opts::new("slurm_gpus_utilization", "Total GPU utilization"),
            user_alloc: Opts::new(
                "slurm_user_gpus_running",
                "GPUs allocated per user for running jobs",
            ),
        }
    }
}

/// Collector for cluster GPU gauges.
///
/// Holds no values between scrapes: every `collect` queries Slurm again and
/// builds its gauges from scratch.
pub struct GpuCollector<R: CommandRunner = SystemRunner> {
    runner: R,
    queries: SlurmQueries,
    opts: GaugeOpts,
    descs: Vec<Desc>,
}

impl GpuCollector<SystemRunner> {
    pub fn new(queries: SlurmQueries) -> Result<Self> {
        Self::with_runner(SystemRunner, queries)
    }
}

impl<R: CommandRunner> GpuCollector<R> {
    pub fn with_runner(runner: R, queries: SlurmQueries) -> Result<Self> {
        let opts = GaugeOpts::new();
        let descs = vec![
            opts.alloc.describe()?,
            opts.idle.describe()?,
            opts.total.describe()?,
            opts.utilization.describe()?,
            opts.user_alloc
                .clone()
                .variable_labels(vec![USER_LABEL.to_string()])
                .describe()?,
        ];

        Ok(Self {
            runner,
            queries,
            opts,
            descs,
        })
    }

    /// Run one poll and return its metric families, or the reason it failed
    pub fn try_collect(&self) -> Result<Vec<MetricFamily>> {
        let snapshot = collect_snapshot(&self.runner, &self.queries)?;
        self.families(&snapshot)
    }

    fn families(&self, snapshot: &GpuSnapshot) -> Result<Vec<MetricFamily>> {
        let mut families = Vec::with_capacity(self.descs.len());

        for (opts, value) in [
            (&self.opts.alloc, snapshot.alloc),
            (&self.opts.idle, snapshot.idle),
            (&self.opts.total, snapshot.total),
            (&self.opts.utilization, snapshot.utilization),
        ] {
            let gauge = Gauge::with_opts(opts.clone())?;
            gauge.set(value);
            families.extend(gauge.collect());
        }

        // An empty family can't be encoded, so skip it when nobody holds GPUs
        if !snapshot.user_alloc.is_empty() {
            let per_user = GaugeVec::new(self.opts.user_alloc.clone(), &[USER_LABEL])?;
            for (user, alloc) in &snapshot.user_alloc {
                per_user.with_label_values(&[user.as_str()]).set(*alloc);
            }
            families.extend(per_user.collect());
        }

        Ok(families)
    }
}

impl<R: CommandRunner> Collector for GpuCollector<R> {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        match self.try_collect() {
            Ok(families) => families,
            Err(e) => {
                warn!("GPU poll failed: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use prometheus::Registry;

    use super::*;
    use crate::slurm::command::fake::FakeRunner;

    fn example_runner() -> FakeRunner {
        FakeRunner::new()
            .with_output("sinfo", "node1 gpu:a100:4\nnode2 gpu:v100:2\n")
            .with_output("sacct", "alice|gres/gpu=2,mem=10G\nbob|gres/gpu=1\n")
    }

    fn gauge_value(families: &[MetricFamily], name: &str) -> f64 {
        let family = families
            .iter()
            .find(|f| f.get_name() == name)
            .unwrap_or_else(|| panic!("missing family {name}"));
        family.get_metric()[0].get_gauge().get_value()
    }

    fn user_values(families: &[MetricFamily]) -> Vec<(String, f64)> {
        let mut values: Vec<(String, f64)> = families
            .iter()
            .filter(|f| f.get_name() == "slurm_user_gpus_running")
            .flat_map(|f| f.get_metric().iter())
            .map(|m| {
                let label = &m.get_label()[0];
                assert_eq!(label.get_name(), "user");
                (label.get_value().to_string(), m.get_gauge().get_value())
            })
            .collect();
        values.sort_by(|a, b| a.0.cmp(&b.0));
        values
    }

    #[test]
    fn test_describe_does_not_poll() {
        let collector = GpuCollector::with_runner(example_runner(), SlurmQueries::default()).unwrap();
        let names: Vec<&str> = collector.desc().iter().map(|d| d.fq_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "slurm_gpus_alloc",
                "slurm_gpus_idle",
                "slurm_gpus_total",
                "slurm_gpus_utilization",
                "slurm_user_gpus_running",
            ]
        );
        assert_eq!(collector.desc()[4].variable_labels, vec!["user".to_string()]);
        assert_eq!(collector.runner.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_collect_emits_all_gauges() {
        let collector = GpuCollector::with_runner(example_runner(), SlurmQueries::default()).unwrap();
        let families = collector.try_collect().unwrap();

        assert_eq!(gauge_value(&families, "slurm_gpus_alloc"), 3.0);
        assert_eq!(gauge_value(&families, "slurm_gpus_idle"), 3.0);
        assert_eq!(gauge_value(&families, "slurm_gpus_total"), 6.0);
        assert_eq!(gauge_value(&families, "slurm_gpus_utilization"), 0.5);
        assert_eq!(
            user_values(&families),
            vec![("alice".to_string(), 2.0), ("bob".to_string(), 1.0)]
        );
        // One sinfo and one sacct run per poll
        assert_eq!(collector.runner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_each_collect_polls_again() {
        let collector = GpuCollector::with_runner(example_runner(), SlurmQueries::default()).unwrap();
        collector.collect();
        collector.collect();
        assert_eq!(collector.runner.calls.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_no_users_omits_user_family() {
        let runner = FakeRunner::new()
            .with_output("sinfo", "node1 gpu:a100:4\n")
            .with_output("sacct", "");
        let collector = GpuCollector::with_runner(runner, SlurmQueries::default()).unwrap();
        let families = collector.try_collect().unwrap();

        assert_eq!(families.len(), 4);
        assert_eq!(gauge_value(&families, "slurm_gpus_idle"), 4.0);
        assert!(user_values(&families).is_empty());
    }

    #[test]
    fn test_negative_idle_is_published() {
        let runner = FakeRunner::new()
            .with_output("sinfo", "")
            .with_output("sacct", "alice|gres/gpu=1\n");
        let collector = GpuCollector::with_runner(runner, SlurmQueries::default()).unwrap();
        let families = collector.try_collect().unwrap();

        assert_eq!(gauge_value(&families, "slurm_gpus_idle"), -1.0);
        assert_eq!(gauge_value(&families, "slurm_gpus_utilization"), 0.0);
    }

    #[test]
    fn test_failed_poll() {
        let collector = GpuCollector::with_runner(FakeRunner::new(), SlurmQueries::default()).unwrap();
        assert!(collector.try_collect().is_err());
        assert!(collector.collect().is_empty());
    }

    #[test]
    fn test_registers_with_registry() {
        let collector = GpuCollector::with_runner(example_runner(), SlurmQueries::default()).unwrap();
        let registry = Registry::new();
        registry.register(Box::new(collector)).unwrap();

        let families = registry.gather();
        assert_eq!(families.len(), 5);
        assert_eq!(gauge_value(&families, "slurm_gpus_total"), 6.0);
    }
}
