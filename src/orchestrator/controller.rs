//! Action lifecycle controller.
//!
//! Gates each action on the active document, sequences process invocations and
//! reports outcomes as notices for presentation layers.

use super::post_process::{extract_results, write_results};
use crate::config::CommandSet;
use crate::engine::{CommandFailure, OutputSink, ProcessRunner};
use crate::model::{Action, ActionOutcome, ActiveDocument, CommandKind, Notice};
use crate::paths;
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

pub(crate) const NO_ACTIVE_FILE: &str = "No file is currently opened";
pub(crate) const NOT_RSL_FILE: &str = "The currently opened file is not an RSL file";
pub(crate) const NO_COMPILED_FILE: &str =
    "Could not find an SML file with the same name as the currently opened RSL file";
pub(crate) const NOTHING_TO_EXTRACT: &str = "There were no results to extract";
pub(crate) const SAVE_FAILED: &str = "Failed to save results";

/// Runs the four user actions against one runner, command set and sink.
pub(crate) struct Workflow<R> {
    runner: R,
    commands: CommandSet,
    sink: Arc<dyn OutputSink>,
    notices: UnboundedSender<Notice>,
}

impl<R: ProcessRunner> Workflow<R> {
    pub fn new(
        runner: R,
        commands: CommandSet,
        sink: Arc<dyn OutputSink>,
        notices: UnboundedSender<Notice>,
    ) -> Self {
        Self {
            runner,
            commands,
            sink,
            notices,
        }
    }

    /// Run `action` for the active document.
    ///
    /// Nothing is launched unless a document is open and it is RSL. Failures are
    /// reported as notices; this never returns an error.
    pub async fn dispatch(&self, action: Action, doc: Option<&ActiveDocument>) -> ActionOutcome {
        let Some(file) = self.active_rsl_file(doc) else {
            return ActionOutcome::skipped();
        };

        tracing::info!(action = action.name(), file = %file.display(), "starting");
        let result = match action {
            Action::TypeCheck => self.type_check(file).await,
            Action::Compile => self.compile(file).await,
            Action::Run => self.run(file).await,
            Action::SaveResults => self.save_results(file).await,
        };

        match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(action = action.name(), error = %format!("{e:#}"), "action failed");
                let message = match action {
                    Action::SaveResults => SAVE_FAILED.to_string(),
                    _ => format!("{} failed: {e:#}", action.name()),
                };
                self.notify(Notice::error(message));
                ActionOutcome::skipped()
            }
        }
    }

    fn active_rsl_file<'a>(&self, doc: Option<&'a ActiveDocument>) -> Option<&'a Path> {
        match doc {
            None => {
                self.notify(Notice::warning(NO_ACTIVE_FILE));
                None
            }
            Some(d) if !d.is_rsl() => {
                self.notify(Notice::warning(NOT_RSL_FILE));
                None
            }
            Some(d) => Some(&d.path),
        }
    }

    pub async fn type_check(&self, file: &Path) -> Result<ActionOutcome> {
        let out = self.invoke(CommandKind::TypeCheck, file).await?;
        Ok(ActionOutcome::with_output(out))
    }

    pub async fn compile(&self, file: &Path) -> Result<ActionOutcome> {
        let out = self.invoke(CommandKind::Compile, file).await?;
        Ok(ActionOutcome::with_output(out))
    }

    /// Execute the SML translation that sits next to `file`.
    pub async fn run(&self, file: &Path) -> Result<ActionOutcome> {
        let compiled = paths::compiled_path(file)?;
        let exists = tokio::fs::try_exists(&compiled).await.unwrap_or(false);
        if !exists {
            tracing::warn!(path = %compiled.display(), "no compiled file");
            self.notify(Notice::warning(NO_COMPILED_FILE));
            return Ok(ActionOutcome::skipped());
        }
        let out = self.invoke(CommandKind::Execute, &compiled).await?;
        Ok(ActionOutcome::with_output(out))
    }

    /// Compile, run, extract, and write `<name>.results`.
    pub async fn save_results(&self, file: &Path) -> Result<ActionOutcome> {
        self.compile(file).await?;
        let run = self.run(file).await?;

        // Log-only, unlike every other failure path.
        let transcript = match run.output {
            Some(t) if !t.is_empty() => t,
            _ => {
                tracing::error!(file = %file.display(), "run produced no output, nothing saved");
                return Ok(ActionOutcome::skipped());
            }
        };

        let extracted = extract_results(&transcript);
        if extracted.is_empty() {
            self.notify(Notice::info(NOTHING_TO_EXTRACT));
            return Ok(ActionOutcome::with_output(transcript));
        }

        let target = paths::results_path(file)?;
        write_results(&target, &extracted)
            .with_context(|| format!("save results to {}", target.display()))?;
        tracing::info!(path = %target.display(), lines = extracted.lines().count(), "results saved");
        self.notify(Notice::info(format!("Results saved to {}", target.display())));

        Ok(ActionOutcome {
            output: Some(transcript),
            results_path: Some(target),
        })
    }

    /// Run the configured `kind` command against `target`. A non-zero exit is
    /// reported but the captured stdout is still returned.
    async fn invoke(&self, kind: CommandKind, target: &Path) -> Result<String> {
        let command = self.commands.get(kind);
        let output = self
            .runner
            .run(command, target, self.sink.as_ref())
            .await
            .with_context(|| format!("run {}", kind.config_key()))?;

        tracing::info!(
            command,
            exit_code = output.exit_code,
            elapsed = %humantime::format_duration(output.elapsed),
            "command finished"
        );
        if let Some(failure) = CommandFailure::from_output(command, &output) {
            tracing::warn!(
                command,
                exit_code = failure.exit_code,
                stderr = %output.stderr.trim_end(),
                "command failed"
            );
            self.notify(Notice::error(failure.message()));
        }
        Ok(output.stdout)
    }

    fn notify(&self, notice: Notice) {
        tracing::debug!(level = ?notice.level, message = %notice.message, "notice");
        let _ = self.notices.send(notice);
    }
}
