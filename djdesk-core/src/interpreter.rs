// djdesk-core/src/interpreter.rs
//! Locating and interrogating Python interpreters, both on the host and
//! inside a built bundle.

use std::path::{Path, PathBuf};

use djdesk_aio::process::{captured_text, run_command_async};
use djdesk_common::error::{DjdeskError, Result};
use tracing::debug;

/// Finds a usable host interpreter. An explicit override is taken as-is;
/// otherwise each candidate is invoked with `--version` and the first one
/// that runs successfully wins.
pub async fn locate_host_python(
    override_cmd: Option<&str>,
    candidates: &[&str],
) -> Result<PathBuf> {
    if let Some(cmd) = override_cmd.filter(|c| !c.is_empty()) {
        debug!("Using interpreter override: {}", cmd);
        return Ok(PathBuf::from(cmd));
    }

    for candidate in candidates {
        let program = Path::new(candidate);
        match run_command_async(program, vec!["--version".into()], None, None).await {
            Ok(output) if output.status.success() => {
                debug!("Found host interpreter '{}': {}", candidate, captured_text(&output));
                return Ok(program.to_path_buf());
            }
            Ok(output) => debug!(
                "Candidate '{}' exited with {}; trying next",
                candidate, output.status
            ),
            Err(e) => debug!("Candidate '{}' unavailable: {}", candidate, e),
        }
    }

    Err(DjdeskError::InterpreterNotFound(format!(
        "tried {}; install Python 3.14+ or set the PYTHON environment variable",
        candidates.join(", ")
    )))
}

/// Output of `python --version` (older interpreters print it on stderr).
pub async fn interpreter_version(python: &Path) -> Result<String> {
    let output = run_command_async(python, vec!["--version".into()], None, None).await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    Ok(format!("{stdout}{stderr}").trim().to_string())
}

pub async fn ensure_version(python: &Path, expected: &str) -> Result<String> {
    let reported = interpreter_version(python).await?;
    if reported.contains(expected) {
        debug!("{} reports {}", python.display(), reported);
        Ok(reported)
    } else {
        Err(DjdeskError::InterpreterVersionMismatch {
            expected: expected.to_string(),
            actual: reported,
        })
    }
}

/// Interpreter executable inside a bundle's interpreter root, if present.
/// Standalone archives use `bin/python3` (`python.exe` on Windows); Windows
/// virtual environments keep theirs under `Scripts`.
pub fn bundled_interpreter(interpreter_root: &Path) -> Option<PathBuf> {
    let candidates: &[&[&str]] = if cfg!(windows) {
        &[&["python.exe"], &["Scripts", "python.exe"]]
    } else {
        &[&["bin", "python3"]]
    };
    candidates
        .iter()
        .map(|parts| parts.iter().fold(interpreter_root.to_path_buf(), |p, s| p.join(s)))
        .find(|path| path.is_file())
}

/// A bundle interpreter root created by `venv` must not get a PYTHONHOME override.
pub fn is_virtual_env(interpreter_root: &Path) -> bool {
    interpreter_root.join("pyvenv.cfg").is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_support::write_script;

    #[tokio::test]
    async fn override_wins_without_probing() {
        let found = locate_host_python(Some("/opt/custom/python"), &["python3"])
            .await
            .unwrap();
        assert_eq!(found, PathBuf::from("/opt/custom/python"));
    }

    #[tokio::test]
    async fn first_working_candidate_wins() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken-python");
        let working = dir.path().join("working-python");
        write_script(&broken, "exit 1");
        write_script(&working, "echo 'Python 3.14.0'");

        let missing = dir.path().join("missing-python");
        let candidates = [
            missing.to_str().unwrap(),
            broken.to_str().unwrap(),
            working.to_str().unwrap(),
        ];
        let found = locate_host_python(None, &candidates).await.unwrap();
        assert_eq!(found, working);
    }

    #[tokio::test]
    async fn no_candidate_is_interpreter_not_found() {
        let err = locate_host_python(None, &["djdesk-no-python-here"])
            .await
            .unwrap_err();
        assert!(matches!(err, DjdeskError::InterpreterNotFound(_)));
    }

    #[tokio::test]
    async fn version_check_reads_stderr_too() {
        let dir = tempfile::tempdir().unwrap();
        let python = dir.path().join("python3");
        write_script(&python, "echo 'Python 3.12.1' >&2");

        let err = ensure_version(&python, "3.14.0").await.unwrap_err();
        match err {
            DjdeskError::InterpreterVersionMismatch { expected, actual } => {
                assert_eq!(expected, "3.14.0");
                assert_eq!(actual, "Python 3.12.1");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(ensure_version(&python, "3.12").await.unwrap(), "Python 3.12.1");
    }

    #[test]
    fn bundled_interpreter_requires_the_binary() {
        let dir = tempfile::tempdir().unwrap();
        assert!(bundled_interpreter(dir.path()).is_none());
        write_script(&dir.path().join("bin/python3"), "true");
        assert_eq!(
            bundled_interpreter(dir.path()),
            Some(dir.path().join("bin/python3"))
        );
        assert!(!is_virtual_env(dir.path()));
        std::fs::write(dir.path().join("pyvenv.cfg"), "home = /usr/bin\n").unwrap();
        assert!(is_virtual_env(dir.path()));
    }
}
