//! Tool launch: generate the in-sandbox launcher, run it, extract the
//! JSON result from its stdout.
//!
//! The launcher is a short Python program written into `scratch/` per
//! invocation. It locates the tool's entry class dynamically (any subclass
//! of `BaseTool` exposing `run_sync`), binds the validated input to the
//! method's parameters, and prints the return value as a single JSON
//! document on stdout. Diagnostics go to stderr; failures exit nonzero.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context;
use serde_json::Value;
use thiserror::Error;

use crate::common::run_with_timeout;
use crate::manager::Sandbox;

const LAUNCHER_TEMPLATE: &str = include_str!("../assets/execute_tool.py");

#[derive(Debug, Error)]
pub enum LaunchError {
    /// Launcher exited nonzero or was killed by the wall-clock timeout.
    #[error("{message}")]
    Execution {
        message: String,
        stdout: String,
        stderr: String,
    },

    /// The child exited cleanly but stdout held no parseable JSON document.
    #[error("{message}")]
    InvalidOutput {
        message: String,
        stdout: String,
        stderr: String,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Successful launch: the parsed result plus the raw stdout it came from.
#[derive(Debug)]
pub struct LaunchOutput {
    pub result: Value,
    pub stdout: String,
}

/// Run the downloaded tool inside the sandbox and collect its JSON result.
pub fn run_tool(
    sandbox: &Sandbox,
    tool_file: &Path,
    validated_input: &Value,
    timeout_secs: u64,
) -> Result<LaunchOutput, LaunchError> {
    let launcher = write_launcher(sandbox, tool_file, validated_input)?;

    tracing::info!(
        tool = %sandbox.tool_name,
        launcher = %launcher.display(),
        "Launching tool"
    );

    let out = run_with_timeout(
        Command::new(&sandbox.runtime_exe)
            .arg(&launcher)
            .current_dir(&sandbox.root)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONUTF8", "1"),
        timeout_secs,
    )
    .context("Run tool launcher")?;

    if out.timed_out {
        return Err(LaunchError::Execution {
            message: format!("Tool execution timeout ({} seconds)", timeout_secs),
            stdout: out.stdout,
            stderr: out.stderr,
        });
    }
    if out.exit_code != 0 {
        return Err(LaunchError::Execution {
            message: format!(
                "Tool exited with code {}: {}",
                out.exit_code,
                out.stderr.trim()
            ),
            stdout: out.stdout,
            stderr: out.stderr,
        });
    }

    match extract_json_result(&out.stdout) {
        Some(result) => Ok(LaunchOutput {
            result,
            stdout: out.stdout,
        }),
        None => Err(LaunchError::InvalidOutput {
            message: "no JSON document found on stdout".to_string(),
            stdout: out.stdout,
            stderr: out.stderr,
        }),
    }
}

/// Write the validated input and the launcher into `scratch/`.
fn write_launcher(
    sandbox: &Sandbox,
    tool_file: &Path,
    validated_input: &Value,
) -> Result<PathBuf, LaunchError> {
    let input_path = sandbox.scratch_dir.join("input.json");
    let input_doc = serde_json::to_string(validated_input)
        .context("Serialize validated input")?;
    std::fs::write(&input_path, input_doc)
        .with_context(|| format!("Write {}", input_path.display()))?;

    let script = LAUNCHER_TEMPLATE
        .replace("<TOOL_FILE>", &tool_file.display().to_string())
        .replace("<INPUT_FILE>", &input_path.display().to_string());

    let launcher_path = sandbox.scratch_dir.join("execute_tool.py");
    std::fs::write(&launcher_path, script)
        .with_context(|| format!("Write {}", launcher_path.display()))?;
    Ok(launcher_path)
}

/// Find the result document in the child's stdout: scan lines in reverse
/// for the last one that starts with `{` and parses as JSON; fall back to
/// parsing the whole stream.
fn extract_json_result(stdout: &str) -> Option<Value> {
    for line in stdout.trim().lines().rev() {
        let trimmed = line.trim();
        if trimmed.starts_with('{') {
            if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
                return Some(value);
            }
        }
    }
    serde_json::from_str::<Value>(stdout.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn fake_sandbox(root: &Path) -> Sandbox {
        let sandbox = Sandbox {
            root: root.to_path_buf(),
            runtime_exe: root.join("runtime/bin/python"),
            installer_exe: root.join("runtime/bin/pip"),
            tools_dir: root.join("tools"),
            scripts_dir: root.join("scripts"),
            scratch_dir: root.join("scratch"),
            created_at: Utc::now(),
            tool_name: "TestTool".to_string(),
        };
        std::fs::create_dir_all(&sandbox.scratch_dir).unwrap();
        sandbox
    }

    #[test]
    fn extracts_last_json_line() {
        let stdout = "log line\n{\"partial\": \ninfo\n{\"status\": \"ok\", \"n\": 2}\n";
        let value = extract_json_result(stdout).unwrap();
        assert_eq!(value["status"], "ok");
        assert_eq!(value["n"], 2);
    }

    #[test]
    fn falls_back_to_whole_stdout() {
        let stdout = "{\n  \"status\": \"ok\"\n}";
        let value = extract_json_result(stdout).unwrap();
        assert_eq!(value["status"], "ok");
    }

    #[test]
    fn no_json_yields_none() {
        assert!(extract_json_result("nothing here\njust logs\n").is_none());
        assert!(extract_json_result("").is_none());
    }

    #[test]
    fn launcher_is_written_with_paths_substituted() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = fake_sandbox(dir.path());
        let tool_file = sandbox.tools_dir.join("EchoTool.py");

        let launcher =
            write_launcher(&sandbox, &tool_file, &json!({"q": "acme", "n": 3})).unwrap();
        assert_eq!(launcher, sandbox.scratch_dir.join("execute_tool.py"));

        let script = std::fs::read_to_string(&launcher).unwrap();
        assert!(script.contains("EchoTool.py"));
        assert!(!script.contains("<TOOL_FILE>"));
        assert!(!script.contains("<INPUT_FILE>"));
        assert!(script.contains("BaseTool"));

        let input: Value = serde_json::from_str(
            &std::fs::read_to_string(sandbox.scratch_dir.join("input.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(input, json!({"q": "acme", "n": 3}));
    }
}
