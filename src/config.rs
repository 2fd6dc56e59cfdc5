//! Command settings.
//!
//! Settings live in a JSON file namespaced under `"raise"`:
//!
//! ```json
//! { "raise": { "commands": { "typecheck": "rsltc", "compile": "rsltc -m", "execute": "sml" } } }
//! ```
//!
//! Command-line flags (or their environment variables) take precedence over the
//! file, which takes precedence over the built-in defaults.

use crate::model::CommandKind;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level namespace of the settings file.
pub const NAMESPACE: &str = "raise";

const DEFAULT_TYPECHECK: &str = "rsltc";
const DEFAULT_COMPILE: &str = "rsltc -m";
const DEFAULT_EXECUTE: &str = "sml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("'raise.{0}' must not be blank")]
    BlankCommand(&'static str),
}

/// Raw settings document.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    root: Value,
}

impl Settings {
    /// Default settings location, e.g. `~/.config/raise-runner/settings.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("raise-runner").join("settings.json"))
    }

    pub fn from_json(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let root = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { root })
    }

    /// Read settings from `path`. A missing file yields empty settings unless
    /// `required` is set.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_json(&text, path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                tracing::debug!(path = %path.display(), "no settings file, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Look up a dotted field inside the namespace, e.g. `get("commands.compile")`.
    pub fn get(&self, field: &str) -> Option<&str> {
        field
            .split('.')
            .try_fold(self.root.get(NAMESPACE)?, |v, key| v.get(key))?
            .as_str()
    }
}

/// Per-command overrides, usually from the command line.
#[derive(Debug, Clone, Default)]
pub struct CommandOverrides {
    pub typecheck: Option<String>,
    pub compile: Option<String>,
    pub execute: Option<String>,
}

/// The resolved command for each action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSet {
    pub typecheck: String,
    pub compile: String,
    pub execute: String,
}

impl CommandSet {
    pub fn resolve(settings: &Settings, overrides: &CommandOverrides) -> Result<Self, ConfigError> {
        let pick = |kind: CommandKind, over: &Option<String>, default: &str| {
            let value = over
                .as_deref()
                .or_else(|| settings.get(kind.config_key()))
                .unwrap_or(default);
            if value.trim().is_empty() {
                return Err(ConfigError::BlankCommand(kind.config_key()));
            }
            Ok(value.to_string())
        };
        Ok(Self {
            typecheck: pick(CommandKind::TypeCheck, &overrides.typecheck, DEFAULT_TYPECHECK)?,
            compile: pick(CommandKind::Compile, &overrides.compile, DEFAULT_COMPILE)?,
            execute: pick(CommandKind::Execute, &overrides.execute, DEFAULT_EXECUTE)?,
        })
    }

    pub fn get(&self, kind: CommandKind) -> &str {
        match kind {
            CommandKind::TypeCheck => &self.typecheck,
            CommandKind::Compile => &self.compile,
            CommandKind::Execute => &self.execute,
        }
    }
}
