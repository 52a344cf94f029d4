// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Prometheus exposition: the GPU collector and the HTTP endpoint serving it.

pub mod collector;
pub mod server;

pub use collector::GpuCollector;
pub use server::serve;

use prometheus::proto::MetricFamily;
use prometheus::{Encoder, TextEncoder};

use crate::error::Result;

/// Encode metric families in the Prometheus text format
pub fn encode_text(families: &[MetricFamily]) -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
