use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

/// Language identifier of RSL documents.
pub const RSL_LANGUAGE_ID: &str = "rsl";

/// User-triggered actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    TypeCheck,
    Compile,
    Run,
    SaveResults,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::TypeCheck => "type-check",
            Action::Compile => "compile",
            Action::Run => "run",
            Action::SaveResults => "save-results",
        }
    }
}

/// The external commands that can be configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    TypeCheck,
    Compile,
    Execute,
}

impl CommandKind {
    /// Settings key inside the `raise` namespace.
    pub fn config_key(self) -> &'static str {
        match self {
            CommandKind::TypeCheck => "commands.typecheck",
            CommandKind::Compile => "commands.compile",
            CommandKind::Execute => "commands.execute",
        }
    }
}

/// The document an action applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDocument {
    pub path: PathBuf,
    pub language_id: String,
}

impl ActiveDocument {
    pub fn is_rsl(&self) -> bool {
        self.language_id == RSL_LANGUAGE_ID
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible message emitted by the workflow and rendered by the CLI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// Render for a terminal, e.g. `warning: No file is currently opened`.
    pub fn to_message(&self) -> String {
        let tag = match self.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        format!("{tag}: {}", self.message)
    }
}

/// Finalized result of one external process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub elapsed: Duration,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// What an action produced. `output` is `None` when no process was run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    pub output: Option<String>,
    pub results_path: Option<PathBuf>,
}

impl ActionOutcome {
    pub fn skipped() -> Self {
        Self::default()
    }

    pub fn with_output(output: String) -> Self {
        Self {
            output: Some(output),
            results_path: None,
        }
    }
}

/// Machine-readable summary printed in `--json` mode.
#[derive(Debug, Clone, Serialize)]
pub struct ActionReport {
    pub timestamp_utc: String,
    pub action: Action,
    pub file: Option<PathBuf>,
    pub output: Option<String>,
    pub results_path: Option<PathBuf>,
    pub notices: Vec<Notice>,
}

impl ActionReport {
    pub fn has_errors(&self) -> bool {
        self.notices.iter().any(|n| n.level == NoticeLevel::Error)
    }
}
