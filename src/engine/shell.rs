//! Building the shell command line for a single invocation.

use super::RunnerError;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Character used to delimit the file argument on this platform.
#[cfg(windows)]
pub const QUOTE: char = '"';
#[cfg(not(windows))]
pub const QUOTE: char = '\'';

/// A fully resolved invocation: run `command_line` through the platform shell
/// from inside `working_dir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Invocation {
    pub working_dir: PathBuf,
    pub file_name: String,
    pub command_line: String,
}

impl Invocation {
    /// The target is passed by base name from its own directory so the command
    /// line never carries the directory part of the path.
    pub fn new(command: &str, target: &Path) -> Result<Self, RunnerError> {
        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| RunnerError::InvalidTarget(target.to_path_buf()))?
            .to_string();
        let working_dir = match target.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let command_line = format!("{} {}", command.trim(), quote(&file_name));
        Ok(Self {
            working_dir,
            file_name,
            command_line,
        })
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = shell_command(&self.command_line);
        cmd.current_dir(&self.working_dir).kill_on_drop(true);
        cmd
    }
}

/// Quote a single argument for the platform shell.
pub fn quote(arg: &str) -> String {
    if cfg!(windows) {
        format!("{QUOTE}{arg}{QUOTE}")
    } else {
        // POSIX single quotes cannot be escaped inside; close, escape, reopen.
        format!("{QUOTE}{}{QUOTE}", arg.replace('\'', r"'\''"))
    }
}

#[cfg(not(windows))]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(line);
    cmd
}

#[cfg(windows)]
fn shell_command(line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").raw_arg(line);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_uses_parent_dir_and_base_name() {
        let inv = Invocation::new("rsltc -m", Path::new("/home/u/my specs/bank.rsl")).unwrap();
        assert_eq!(inv.working_dir, PathBuf::from("/home/u/my specs"));
        assert_eq!(inv.file_name, "bank.rsl");
        assert_eq!(
            inv.command_line,
            format!("rsltc -m {QUOTE}bank.rsl{QUOTE}")
        );
        assert!(!inv.command_line.contains("/home/u"));
    }

    #[test]
    fn bare_file_name_runs_in_current_dir() {
        let inv = Invocation::new("sml", Path::new("bank.sml")).unwrap();
        assert_eq!(inv.working_dir, PathBuf::from("."));
    }

    #[test]
    fn command_does_not_outlive_its_handle() {
        let inv = Invocation::new("sml", Path::new("/work/bank.sml")).unwrap();
        assert!(inv.to_command().get_kill_on_drop());
    }

    #[test]
    fn path_without_file_name_is_rejected() {
        assert!(matches!(
            Invocation::new("sml", Path::new("/")),
            Err(RunnerError::InvalidTarget(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn embedded_single_quote_is_escaped() {
        assert_eq!(quote("it's.rsl"), r"'it'\''s.rsl'");
    }
}
