// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Errors that fail a single poll.

use std::process::ExitStatus;

/// Reasons a poll could not produce a snapshot.
///
/// None of these terminate the process; the HTTP layer reports them as a
/// failed scrape and the next poll starts from scratch.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The command could not be started or its output could not be read
    #[error("failed to execute {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran but exited unsuccessfully
    #[error("{program} exited with {status}")]
    Failed { program: String, status: ExitStatus },

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),
}

pub type Result<T> = std::result::Result<T, PollError>;
