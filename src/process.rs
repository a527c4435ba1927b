//! Launching external merge tools.
//!
//! The launcher runs the tool as a child process via `tokio::process` with
//! `kill_on_drop`, so dropping the future terminates the tool. An optional
//! timeout bounds the wait.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use crate::core::traits::{LaunchRequest, ProcessLauncher, ProcessOutput, StdioMode};
use crate::error::{ResolveError, ResolveResult};

/// Runs merge tools with `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct TokioLauncher {
    timeout: Option<Duration>,
}

impl TokioLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds how long a tool may run. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn wait(&self, request: &LaunchRequest) -> std::io::Result<ProcessOutput> {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args)
            .current_dir(&request.working_dir)
            .stdin(Stdio::inherit())
            .kill_on_drop(true);

        match request.stdio {
            StdioMode::Capture => {
                cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
                let output = cmd.output().await?;
                Ok(ProcessOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                })
            }
            StdioMode::Inherit => {
                cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
                let status = cmd.status().await?;
                Ok(ProcessOutput {
                    exit_code: status.code(),
                    ..ProcessOutput::default()
                })
            }
        }
    }
}

#[async_trait]
impl ProcessLauncher for TokioLauncher {
    async fn run(&self, request: &LaunchRequest) -> ResolveResult<ProcessOutput> {
        debug!(command = %request.display_command(), "launching merge tool");
        let program = request.program.display().to_string();
        let launch_failed = |e: std::io::Error| ResolveError::ToolLaunchFailed {
            program: program.clone(),
            message: e.to_string(),
        };

        let output = match self.timeout {
            Some(limit) => match timeout(limit, self.wait(request)).await {
                Ok(result) => result.map_err(launch_failed)?,
                Err(_) => {
                    return Err(ResolveError::ToolTimedOut {
                        program: program.clone(),
                        seconds: limit.as_secs(),
                    });
                }
            },
            None => self.wait(request).await.map_err(launch_failed)?,
        };

        debug!(exit_code = ?output.exit_code, "merge tool exited");
        Ok(output)
    }
}
