//! Post-run processing for save-results.
//!
//! Pulls the test results out of an SML/NJ transcript and persists them next to
//! the source file.
//!
//! The extraction depends on the exact console formatting of SML/NJ: a loaded
//! structure is echoed as `... : <sig>` and the generated file then opens it.
//! A change to that banner or to the coverage report wording makes extraction
//! come back empty.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Signature echo followed by the `open` of the test structure.
pub(crate) const SIG_OPEN_MARKER: &str = "<sig>\nopen";

const UNIT_RESULT_LINE: &str = "val it = () : unit";
const PROMPT_LINE: &str = "- ";
const COVERAGE_PREFIXES: [&str; 2] = ["Unexecuted expressions in ", "Complete expression coverage of "];

fn is_noise(line: &str) -> bool {
    line == UNIT_RESULT_LINE
        || line == PROMPT_LINE
        || COVERAGE_PREFIXES.iter().any(|p| line.starts_with(p))
}

/// Extract result lines from an interpreter transcript.
///
/// Takes everything after the line that contains the last `<sig>\nopen` marker,
/// drops interpreter noise (`val it = () : unit`, bare `- ` prompts, coverage
/// report lines) and rejoins the rest with `\n`. Returns an empty string when the
/// marker is absent or nothing survives. Not meant to be applied to its own output.
pub(crate) fn extract_results(transcript: &str) -> String {
    let Some(marker_at) = transcript.rfind(SIG_OPEN_MARKER) else {
        return String::new();
    };
    let after_marker = &transcript[marker_at + SIG_OPEN_MARKER.len()..];
    let Some(newline_at) = after_marker.find('\n') else {
        return String::new();
    };
    let body = &after_marker[newline_at + 1..];

    body.split('\n')
        .filter(|line| !is_noise(line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write `contents` to `path`, replacing any existing file.
///
/// The data goes to a temporary file in the same directory first and is renamed
/// into place, so a failed write leaves any previous file untouched.
pub(crate) fn write_results(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temporary file in {}", dir.display()))?;
    tmp.write_all(contents.as_bytes())
        .context("write results")?;
    tmp.flush().context("flush results")?;
    // Temp files are owner-only; keep the mode readers of the results expect.
    let permissions = match std::fs::metadata(path) {
        Ok(meta) => Some(meta.permissions()),
        Err(_) => fresh_file_permissions(),
    };
    if let Some(permissions) = permissions {
        tmp.as_file()
            .set_permissions(permissions)
            .context("set results permissions")?;
    }
    tmp.persist(path)
        .with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(unix)]
fn fresh_file_permissions() -> Option<std::fs::Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn fresh_file_permissions() -> Option<std::fs::Permissions> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_lines_after_last_open() {
        let transcript = "...<sig>\nopen Foo\nval it = () : unit\n- \nresult1\nUnexecuted expressions in bar\nresult2";
        assert_eq!(extract_results(transcript), "result1\nresult2");
    }

    #[test]
    fn missing_marker_yields_empty() {
        assert_eq!(extract_results("Standard ML of New Jersey\n- result1\n"), "");
        assert_eq!(extract_results(""), "");
    }

    #[test]
    fn reapplying_to_extracted_text_yields_empty() {
        let once = extract_results("structure T : <sig>\nopen T\n[t1] true\n[t2] false");
        assert_eq!(once, "[t1] true\n[t2] false");
        assert_eq!(extract_results(&once), "");
    }

    #[test]
    fn only_the_last_marker_counts() {
        let transcript = "structure A : <sig>\nopen A\nfirst\nstructure B : <sig>\nopen B\nsecond";
        assert_eq!(extract_results(transcript), "second");
    }

    #[test]
    fn complete_coverage_line_is_dropped() {
        let transcript = "S : <sig>\nopen S\n[ok] true\nComplete expression coverage of BANK.rsl\n- ";
        assert_eq!(extract_results(transcript), "[ok] true");
    }

    #[test]
    fn all_noise_yields_empty() {
        let transcript = "S : <sig>\nopen S\nval it = () : unit\n- ";
        assert_eq!(extract_results(transcript), "");
    }

    #[test]
    fn marker_without_following_line_break_yields_empty() {
        assert_eq!(extract_results("S : <sig>\nopen S"), "");
    }

    #[test]
    fn prompt_with_content_is_kept() {
        // Only a bare prompt is noise.
        let transcript = "S : <sig>\nopen S\n- [t] true";
        assert_eq!(extract_results(transcript), "- [t] true");
    }

    #[test]
    fn write_results_overwrites_existing_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("bank.results");
        std::fs::write(&path, "stale results that are longer than the new ones\n").unwrap();

        write_results(&path, "[t1] true").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[t1] true");
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[cfg(unix)]
    #[test]
    fn write_results_keeps_existing_mode_on_overwrite() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("bank.results");
        std::fs::write(&path, "old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o664)).unwrap();

        write_results(&path, "[t1] true").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o664);
    }

    #[cfg(unix)]
    #[test]
    fn fresh_results_file_is_world_readable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("bank.results");

        write_results(&path, "[t1] true").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn write_results_into_missing_dir_fails_without_creating_it() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("missing").join("bank.results");
        assert!(write_results(&path, "x").is_err());
        assert!(!path.exists());
    }
}
