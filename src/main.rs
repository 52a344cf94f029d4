// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

mod error;
mod exporter;
mod gpus;
mod slurm;

use exporter::{encode_text, GpuCollector};
use slurm::{SlurmQueries, SystemRunner};

#[derive(Parser, Debug)]
#[command(name = "slurm-gpu-exporter")]
#[command(about = "Prometheus exporter for Slurm GPU allocation and utilization")]
#[command(version)]
struct Args {
    /// Address to serve metrics on
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen_address: SocketAddr,

    /// HTTP path serving the metrics
    #[arg(long, default_value = "/metrics")]
    metrics_path: String,

    /// sinfo binary used for the GPU inventory
    #[arg(long, default_value = "sinfo")]
    sinfo: String,

    /// sacct binary used for running job allocations
    #[arg(long, default_value = "sacct")]
    sacct: String,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Poll once, print the result to stdout and exit
    #[arg(long)]
    once: bool,

    /// Output format for --once
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Prometheus text exposition
    Text,
    /// Raw snapshot as JSON
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    validate_metrics_path(&args.metrics_path)?;

    let queries = SlurmQueries {
        sinfo: args.sinfo.clone(),
        sacct: args.sacct.clone(),
    };

    if args.once {
        run_once(&queries, args.format)
    } else {
        run_server(queries, args.listen_address, &args.metrics_path)
    }
}

/// Reject metrics paths the router can't serve: relative paths, the health
/// endpoint, and axum path parameters or wildcards
fn validate_metrics_path(path: &str) -> Result<()> {
    if !path.starts_with('/') {
        bail!("--metrics-path must start with '/', got '{}'", path);
    }
    if path == "/health" {
        bail!("--metrics-path '/health' is reserved for the health check");
    }
    if path.contains(['{', '}', '*']) || path.split('/').any(|segment| segment.starts_with(':')) {
        bail!("--metrics-path must be a literal path, got '{}'", path);
    }
    Ok(())
}

/// Logs go to stderr so --once output stays machine-readable
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_once(queries: &SlurmQueries, format: OutputFormat) -> Result<()> {
    let output = match format {
        OutputFormat::Text => {
            let collector = GpuCollector::new(queries.clone()).context("Failed to set up GPU collector")?;
            let families = collector.try_collect().context("GPU poll failed")?;
            encode_text(&families).context("Failed to encode metrics")?
        }
        OutputFormat::Json => {
            let snapshot = gpus::collect_snapshot(&SystemRunner, queries).context("GPU poll failed")?;
            serde_json::to_string_pretty(&snapshot)? + "\n"
        }
    };

    let mut stdout = io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

fn run_server(queries: SlurmQueries, addr: SocketAddr, metrics_path: &str) -> Result<()> {
    let collector = Arc::new(GpuCollector::new(queries).context("Failed to set up GPU collector")?);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    runtime
        .block_on(exporter::serve(collector, addr, metrics_path))
        .with_context(|| format!("Failed to serve metrics on {}", addr))
}
