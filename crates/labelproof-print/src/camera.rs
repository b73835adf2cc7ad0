// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Verification photo capture.
//
// The camera is an external collaborator: the production implementation
// shells out to a configured capture command (a Raspberry Pi camera rig by
// default) and reads encoded image bytes from its stdout.  The trait seam
// lets the worker run against a fake in tests.

use tokio::process::Command;
use tracing::{debug, info};

use labelproof_core::error::{LabelproofError, Result};

/// Source of verification photos.
///
/// One capture per print job, no retries; a failed capture fails the job.
pub trait PhotoSource: Send + Sync + 'static {
    /// Take one photo and return its encoded bytes (PNG expected).
    fn capture(&self) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// Captures photos by running an external command and collecting its stdout.
#[derive(Debug, Clone)]
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
}

impl CommandCamera {
    /// Build from a configured command line (program followed by its
    /// arguments).  The command must write image bytes to stdout.
    pub fn from_command(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| LabelproofError::Validation("capture command is empty".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl PhotoSource for CommandCamera {
    async fn capture(&self) -> Result<Vec<u8>> {
        debug!(program = %self.program, "running capture command");

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| LabelproofError::Capture(format!("{}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LabelproofError::Capture(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        if output.stdout.is_empty() {
            return Err(LabelproofError::Capture(format!(
                "{} produced no output",
                self.program
            )));
        }

        info!(bytes = output.stdout.len(), "photo captured");
        Ok(output.stdout)
    }
}
