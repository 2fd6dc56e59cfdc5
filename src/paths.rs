//! Derived file names for RSL sources.
//!
//! Companion files are named by swapping the textual extension of the source path;
//! nothing here touches the filesystem.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension of RSL source files.
pub const SOURCE_EXT: &str = ".rsl";
/// Extension of the SML translation produced by the compile command.
pub const COMPILED_EXT: &str = ".sml";
/// Suffix of the extracted results file.
pub const RESULTS_EXT: &str = ".results";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("'{path}' does not end with '{expected}'")]
    UnexpectedExtension { path: String, expected: String },
    #[error("'{0}' is not valid UTF-8")]
    NonUtf8(PathBuf),
}

/// Replace the trailing `from` extension of `path` with `to`.
///
/// Fails if `path` does not end with `from`. Matching is on the raw text, so
/// `foo.RSL` is rejected when `from` is `.rsl`.
pub fn replace_extension(path: &Path, from: &str, to: &str) -> Result<PathBuf, PathError> {
    let text = path
        .to_str()
        .ok_or_else(|| PathError::NonUtf8(path.to_path_buf()))?;
    let stem = text
        .strip_suffix(from)
        .ok_or_else(|| PathError::UnexpectedExtension {
            path: text.to_string(),
            expected: from.to_string(),
        })?;
    Ok(PathBuf::from(format!("{stem}{to}")))
}

/// `bank.rsl` -> `bank.sml`
pub fn compiled_path(source: &Path) -> Result<PathBuf, PathError> {
    replace_extension(source, SOURCE_EXT, COMPILED_EXT)
}

/// `bank.rsl` -> `bank.results`
pub fn results_path(source: &Path) -> Result<PathBuf, PathError> {
    replace_extension(source, SOURCE_EXT, RESULTS_EXT)
}

/// Language identifier implied by a file name, e.g. `rsl` for `bank.rsl`.
pub fn language_id_for(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiled_path_swaps_extension() {
        let p = compiled_path(Path::new("/work/specs/bank.rsl")).unwrap();
        assert_eq!(p, PathBuf::from("/work/specs/bank.sml"));
    }

    #[test]
    fn results_path_swaps_extension() {
        let p = results_path(Path::new("/work/my specs/bank.rsl")).unwrap();
        assert_eq!(p, PathBuf::from("/work/my specs/bank.results"));
    }

    #[test]
    fn only_the_trailing_extension_is_replaced() {
        let p = compiled_path(Path::new("/a.rsl/b.rsl")).unwrap();
        assert_eq!(p, PathBuf::from("/a.rsl/b.sml"));
    }

    #[test]
    fn wrong_extension_is_rejected() {
        let err = compiled_path(Path::new("/work/notes.txt")).unwrap_err();
        assert_eq!(
            err,
            PathError::UnexpectedExtension {
                path: "/work/notes.txt".into(),
                expected: ".rsl".into(),
            }
        );
    }

    #[test]
    fn short_name_without_extension_is_rejected() {
        // A blind four-character trim would turn this into ".sml".
        assert!(compiled_path(Path::new("abcd")).is_err());
    }

    #[test]
    fn language_id_from_extension() {
        assert_eq!(language_id_for(Path::new("x/bank.rsl")).as_deref(), Some("rsl"));
        assert_eq!(language_id_for(Path::new("x/bank.sml")).as_deref(), Some("sml"));
        assert_eq!(language_id_for(Path::new("x/Makefile")), None);
    }
}
