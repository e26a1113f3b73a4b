// djdesk-aio/src/process.rs
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;
use std::process::{ExitStatus, Output, Stdio};

use djdesk_common::error::{DjdeskError, Result};
use tokio::process::Command;
use tracing::{debug, error};

/// Runs an external command to completion and captures its output.
/// A non-zero exit is *not* an error here; see [`ensure_success`].
pub async fn run_command_async(
    program: &Path,
    args: Vec<OsString>,
    cwd: Option<&Path>,
    envs: Option<HashMap<String, String>>,
) -> Result<Output> {
    debug!(
        "Running command: {} {:?} (cwd: {:?}, envs: {:?})",
        program.display(),
        args,
        cwd,
        envs.as_ref().map(|e| e.keys().collect::<Vec<_>>()) // Log only keys for envs
    );

    let mut cmd = Command::new(program);
    cmd.args(&args);
    cmd.kill_on_drop(true);

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    if let Some(env_map) = envs {
        cmd.envs(env_map);
    }

    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.stdin(Stdio::null()); // Prevent hanging on stdin

    match cmd.output().await {
        Ok(output) => {
            if !output.status.success() {
                debug!("Command failed with status: {}", output.status);
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stdout.trim().is_empty() {
                    debug!("Stdout:\n{}", stdout.trim());
                }
                if !stderr.trim().is_empty() {
                    debug!("Stderr:\n{}", stderr.trim());
                }
            } else {
                debug!("Command finished successfully.");
            }
            Ok(output)
        }
        Err(e) => {
            error!("Failed to execute {}: {}", program.display(), e);
            Err(DjdeskError::ExternalTool {
                tool: program.display().to_string(),
                status: "failed to start".to_string(),
                output: e.to_string(),
            })
        }
    }
}

/// Turns a non-zero exit into `ExternalTool` carrying the captured output.
pub fn ensure_success(tool: &str, output: Output) -> Result<Output> {
    if output.status.success() {
        Ok(output)
    } else {
        Err(DjdeskError::ExternalTool {
            tool: tool.to_string(),
            status: status_label(&output.status),
            output: captured_text(&output),
        })
    }
}

/// Stdout and stderr, trimmed and joined; stderr first since that is where
/// interpreters report failures.
pub fn captured_text(output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    match (stderr.trim(), stdout.trim()) {
        ("", "") => "<no output>".to_string(),
        (err, "") => err.to_string(),
        ("", out) => out.to_string(),
        (err, out) => format!("{err}\n{out}"),
    }
}

pub fn status_label(status: &ExitStatus) -> String {
    match status.code() {
        Some(code) => code.to_string(),
        None => "terminated by signal".to_string(),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_output_and_env() {
        let mut envs = HashMap::new();
        envs.insert("DJDESK_PROBE".to_string(), "hello".to_string());
        let output = run_command_async(
            Path::new("sh"),
            vec!["-c".into(), "printf \"$DJDESK_PROBE\"".into()],
            None,
            Some(envs),
        )
        .await
        .unwrap();
        let output = ensure_success("sh", output).unwrap();
        assert_eq!(output.stdout, b"hello");
    }

    #[tokio::test]
    async fn non_zero_exit_becomes_external_tool_error() {
        let output = run_command_async(
            Path::new("sh"),
            vec!["-c".into(), "echo boom >&2; exit 3".into()],
            None,
            None,
        )
        .await
        .unwrap();
        match ensure_success("pip", output) {
            Err(DjdeskError::ExternalTool {
                tool,
                status,
                output,
            }) => {
                assert_eq!(tool, "pip");
                assert_eq!(status, "3");
                assert_eq!(output, "boom");
            }
            other => panic!("expected ExternalTool, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_program_reports_tool_name() {
        let err = run_command_async(Path::new("djdesk-no-such-binary"), vec![], None, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("djdesk-no-such-binary"));
    }
}
