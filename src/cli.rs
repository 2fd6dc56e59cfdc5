use crate::config::{CommandOverrides, CommandSet, Settings};
use crate::engine::sink::{ConsoleSink, OutputLine};
use crate::engine::{OutputSink, ShellRunner};
use crate::model::{Action, ActionReport, ActiveDocument, Notice};
use crate::orchestrator::Workflow;
use crate::paths;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
///
/// Raw chunks are written as-is; a full line on either stream first terminates a
/// chunk line left open on the other, so notices never land mid-line.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        // Unlocked handles: tracing writes to stderr from other threads.
        let mut out = std::io::stdout();
        let mut err = std::io::stderr();
        let mut out_open = false;
        let mut err_open = false;

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    end_open_lines(&mut out, &mut err, &mut out_open, &mut err_open);
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    end_open_lines(&mut out, &mut err, &mut out_open, &mut err_open);
                    let _ = writeln!(err, "{}", msg);
                }
                OutputLine::StdoutChunk(chunk) => {
                    let _ = write!(out, "{}", chunk);
                    let _ = out.flush();
                    out_open = !chunk.ends_with('\n');
                }
                OutputLine::StderrChunk(chunk) => {
                    let _ = write!(err, "{}", chunk);
                    let _ = err.flush();
                    err_open = !chunk.ends_with('\n');
                }
                OutputLine::Break { stderr } => {
                    if stderr && err_open {
                        let _ = writeln!(err);
                        err_open = false;
                    } else if !stderr && out_open {
                        let _ = writeln!(out);
                        out_open = false;
                    }
                }
            }
        }

        end_open_lines(&mut out, &mut err, &mut out_open, &mut err_open);
        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

fn end_open_lines(
    out: &mut impl Write,
    err: &mut impl Write,
    out_open: &mut bool,
    err_open: &mut bool,
) {
    if std::mem::take(out_open) {
        let _ = writeln!(out);
    }
    if std::mem::take(err_open) {
        let _ = writeln!(err);
    }
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "raise-runner",
    version,
    about = "Type-check, compile, run, and save results for RSL specifications"
)]
pub struct Cli {
    /// Settings file (defaults to <config dir>/raise-runner/settings.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Type-check command, overrides raise.commands.typecheck
    #[arg(long, env = "RAISE_TYPECHECK_COMMAND", global = true)]
    pub typecheck_command: Option<String>,

    /// RSL-to-SML command, overrides raise.commands.compile
    #[arg(long, env = "RAISE_COMPILE_COMMAND", global = true)]
    pub compile_command: Option<String>,

    /// SML execute command, overrides raise.commands.execute
    #[arg(long, env = "RAISE_EXECUTE_COMMAND", global = true)]
    pub execute_command: Option<String>,

    /// Print a JSON report on stdout (tool output goes to stderr)
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: ActionCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum ActionCommand {
    /// Type-check an RSL file
    TypeCheck(Target),
    /// Translate an RSL file to SML
    Compile(Target),
    /// Run the SML translation next to an RSL file
    Run(Target),
    /// Compile, run, and save the extracted test results to <name>.results
    SaveResults(Target),
}

impl ActionCommand {
    fn split(&self) -> (Action, &Target) {
        match self {
            ActionCommand::TypeCheck(t) => (Action::TypeCheck, t),
            ActionCommand::Compile(t) => (Action::Compile, t),
            ActionCommand::Run(t) => (Action::Run, t),
            ActionCommand::SaveResults(t) => (Action::SaveResults, t),
        }
    }
}

#[derive(Debug, Args, Clone)]
pub struct Target {
    /// The file to act on
    pub file: Option<PathBuf>,

    /// Language identifier of FILE (default: its extension)
    #[arg(long)]
    pub language_id: Option<String>,
}

impl Target {
    /// The document the action applies to, with an absolute path.
    fn active_document(&self) -> Result<Option<ActiveDocument>> {
        let Some(file) = self.file.as_ref() else {
            return Ok(None);
        };
        let path = if file.is_absolute() {
            file.clone()
        } else {
            std::env::current_dir()
                .context("get current directory")?
                .join(file)
        };
        let language_id = self
            .language_id
            .clone()
            .or_else(|| paths::language_id_for(&path))
            .unwrap_or_default();
        Ok(Some(ActiveDocument { path, language_id }))
    }
}

impl Cli {
    fn overrides(&self) -> CommandOverrides {
        CommandOverrides {
            typecheck: self.typecheck_command.clone(),
            compile: self.compile_command.clone(),
            execute: self.execute_command.clone(),
        }
    }

    fn load_settings(&self) -> Result<Settings> {
        let settings = match self.config.as_deref() {
            Some(path) => Settings::load(path, true)?,
            None => match Settings::default_path() {
                Some(path) => Settings::load(&path, false)?,
                None => Settings::default(),
            },
        };
        Ok(settings)
    }
}

/// Run the selected action. Returns `false` when an error was reported.
pub async fn run(args: Cli) -> Result<bool> {
    let settings = args.load_settings().context("failed to load settings")?;
    let commands = CommandSet::resolve(&settings, &args.overrides())?;
    let (action, target) = args.command.split();
    let doc = target.active_document()?;

    let (out_tx, out_handle) = spawn_output_writer();
    let sink: Arc<dyn OutputSink> = Arc::new(ConsoleSink::new(out_tx.clone(), args.json));

    // Notices are printed as they arrive and collected for the report.
    let (notice_tx, mut notice_rx) = mpsc::unbounded_channel::<Notice>();
    let notice_out = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        let mut seen = Vec::new();
        while let Some(notice) = notice_rx.recv().await {
            let _ = notice_out.send(OutputLine::Stderr(notice.to_message()));
            seen.push(notice);
        }
        seen
    });

    let workflow = Workflow::new(ShellRunner, commands, sink, notice_tx);
    let outcome = workflow.dispatch(action, doc.as_ref()).await;
    // Closes the notice channel so the forwarder drains and exits.
    drop(workflow);
    let notices = forwarder.await.context("notice forwarder failed")?;

    let report = ActionReport {
        timestamp_utc: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into()),
        action,
        file: doc.map(|d| d.path),
        output: outcome.output,
        results_path: outcome.results_path,
        notices,
    };

    if args.json {
        let out = serde_json::to_string_pretty(&report)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(!report.has_errors())
}
