//! External process invocation.
//!
//! A [`ProcessRunner`] launches one configured command against one target file,
//! streams stdout into an [`OutputSink`] and hands back the finalized capture.
//! A non-zero exit is not an error at this level; callers inspect
//! [`RunOutput::exit_code`] (see [`CommandFailure`]).

mod shell;
pub(crate) mod sink;
mod stream;

use crate::model::RunOutput;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use thiserror::Error;

use shell::Invocation;
pub use sink::OutputSink;

/// Exit code reported by the toolchain wrappers when the container engine is down.
#[cfg(windows)]
pub const CONTAINER_ENGINE_EXIT_CODE: i32 = 127;
#[cfg(not(windows))]
pub const CONTAINER_ENGINE_EXIT_CODE: i32 = 125;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("cannot run a command against '{}': no file name", .0.display())]
    InvalidTarget(PathBuf),
    #[error("failed to start '{command}'")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("stdout of '{0}' was not captured")]
    MissingStdout(String),
    #[error("I/O error while running '{command}'")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// A command that ran but exited non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    pub command: String,
    pub exit_code: i32,
}

impl CommandFailure {
    pub fn from_output(command: &str, output: &RunOutput) -> Option<Self> {
        (!output.success()).then(|| Self {
            command: command.to_string(),
            exit_code: output.exit_code,
        })
    }

    /// User-facing text. Names the command and, for the container engine code,
    /// adds a hint; the tool's own error text is not included.
    pub fn message(&self) -> String {
        let mut msg = format!("Failed to execute command: '{}'.", self.command);
        if self.exit_code == CONTAINER_ENGINE_EXIT_CODE {
            msg.push_str(" Perhaps the Docker Engine is not running?");
        }
        msg
    }
}

/// Runs one configured command against one file.
pub trait ProcessRunner: Send + Sync {
    fn run(
        &self,
        command: &str,
        target: &Path,
        sink: &dyn OutputSink,
    ) -> impl Future<Output = Result<RunOutput, RunnerError>> + Send;
}

/// Runs commands through the platform shell with `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

impl ProcessRunner for ShellRunner {
    async fn run(
        &self,
        command: &str,
        target: &Path,
        sink: &dyn OutputSink,
    ) -> Result<RunOutput, RunnerError> {
        let invocation = Invocation::new(command, target)?;

        sink.clear();
        sink.reveal();

        let mut cmd = invocation.to_command();
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(
            cwd = %invocation.working_dir.display(),
            line = %invocation.command_line,
            "spawning"
        );

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| RunnerError::Spawn {
            command: command.to_string(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::MissingStdout(command.to_string()))?;
        let stderr = child.stderr.take();

        let (stdout, stderr) = tokio::join!(
            stream::stream_to_sink(stdout, sink),
            stream::read_all(stderr)
        );
        let io_err = |source| RunnerError::Io {
            command: command.to_string(),
            source,
        };
        let status = child.wait().await.map_err(io_err)?;
        let stdout = stdout.map_err(io_err)?;

        let output = RunOutput {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(-1),
            elapsed: start.elapsed(),
        };
        tracing::debug!(
            exit_code = output.exit_code,
            elapsed = %humantime::format_duration(output.elapsed),
            "process exited"
        );
        Ok(output)
    }
}
