//! Execution of the relayed runtime command.

use std::fmt;
use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::debug;

/// A fully translated command, ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Variables added to the inherited environment.
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&shell_words::join(self.argv()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub exit_code: i32,
    /// Captured stdout, present only when capture was requested.
    pub stdout: Option<Vec<u8>>,
}

/// Runs relayed commands. Stdin and stderr are always inherited.
#[async_trait::async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation, capture_stdout: bool) -> Result<RunOutput>;
}

/// Spawns real child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait::async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation, capture_stdout: bool) -> Result<RunOutput> {
        debug!(command = %invocation, capture = capture_stdout, "spawning relayed command");

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::inherit())
            .stderr(Stdio::inherit());

        if capture_stdout {
            let output = cmd
                .stdout(Stdio::piped())
                .output()
                .await
                .with_context(|| format!("running {}", invocation.program))?;
            Ok(RunOutput {
                exit_code: exit_code(output.status),
                stdout: Some(output.stdout),
            })
        } else {
            let status = cmd
                .stdout(Stdio::inherit())
                .status()
                .await
                .with_context(|| format!("running {}", invocation.program))?;
            Ok(RunOutput {
                exit_code: exit_code(status),
                stdout: None,
            })
        }
    }
}

/// Exit code to propagate; signal deaths map to `128 + signal` like a shell.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
