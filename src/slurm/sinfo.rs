// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! GPU inventory from `sinfo`.
//!
//! Each output line describes one node as `<node> <gres>`, where the GRES
//! field looks like `gpu:a100:4`. Lines that don't follow that shape (nodes
//! without GPUs, untyped GRES, socket annotations) are skipped.

use tracing::trace;

use super::command::CommandRunner;
use super::parse_gpu_count;
use crate::error::Result;

/// Arguments for one line per node with its generic resources
pub const SINFO_ARGS: [&str; 3] = ["-h", "-o", "%n %G"];

const GPU_GRES_PREFIX: &str = "gpu:";

/// GPUs attached to a single node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeGpus {
    /// Node hostname
    pub node: String,
    /// GPU model, e.g. "a100"
    pub gpu_type: String,
    /// Number of GPUs on the node
    pub count: f64,
}

/// Parse one `sinfo` line, returning `None` if it carries no usable GPU count
pub fn parse_node_line(line: &str) -> Option<NodeGpus> {
    let mut fields = line.split_whitespace();
    let node = fields.next()?;
    let gres = fields.next()?;

    if !gres.starts_with(GPU_GRES_PREFIX) {
        return None;
    }

    // gpu:<type>:<count>
    let parts: Vec<&str> = gres.split(':').collect();
    if parts.len() < 3 {
        return None;
    }

    Some(NodeGpus {
        node: node.to_string(),
        gpu_type: parts[1].to_string(),
        count: parse_gpu_count(parts[2])?,
    })
}

/// Parse all nodes out of `sinfo` output
pub fn parse_nodes(output: &str) -> Vec<NodeGpus> {
    output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter_map(parse_node_line)
        .collect()
}

/// Run `sinfo` and return the cluster-wide GPU count
pub fn query_total_gpus<R: CommandRunner + ?Sized>(runner: &R, program: &str) -> Result<f64> {
    let args: Vec<String> = SINFO_ARGS.iter().map(|s| s.to_string()).collect();
    let stdout = runner.run(program, &args)?;
    let nodes = parse_nodes(&String::from_utf8_lossy(&stdout));
    for n in &nodes {
        trace!(node = %n.node, gpu_type = %n.gpu_type, count = n.count, "GPU node");
    }
    Ok(nodes.iter().map(|n| n.count).sum())
}
