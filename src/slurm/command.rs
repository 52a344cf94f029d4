// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Run Slurm CLI tools and capture their standard output.

use std::process::{Command, Stdio};

use crate::error::{PollError, Result};

/// Runs an external program to completion and returns its stdout.
///
/// Implementations must be callable from several scrapes at once; nothing is
/// shared between calls.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>>;
}

/// Spawns real processes via `std::process::Command`.
///
/// Stderr is discarded and stdin is closed. There is no timeout: a hung
/// Slurm command hangs the poll that issued it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<Vec<u8>> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|source| PollError::Io {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(PollError::Failed {
                program: program.to_string(),
                status: output.status,
            });
        }

        Ok(output.stdout)
    }
}

/// Canned command output for tests, keyed by program name
#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::{CommandRunner, PollError, Result};

    #[derive(Debug, Default)]
    pub struct FakeRunner {
        outputs: HashMap<String, String>,
        pub calls: AtomicUsize,
    }

    impl FakeRunner {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_output(mut self, program: &str, stdout: &str) -> Self {
            self.outputs.insert(program.to_string(), stdout.to_string());
            self
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, program: &str, _args: &[String]) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outputs
                .get(program)
                .map(|s| s.clone().into_bytes())
                .ok_or_else(|| PollError::Io {
                    program: program.to_string(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                })
        }
    }
}
