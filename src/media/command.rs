//! Subprocess runner shared by every external tool.
//!
//! Each call carries a timeout. The child is spawned with `kill_on_drop`, so
//! a call that times out (or whose future is dropped by a cancelled job)
//! takes the process down with it instead of leaving it running.

use crate::error::ToolError;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Captured output of a successful tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs `program` with `args`, failing on spawn error, timeout or non-zero exit.
pub async fn run_tool(
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<ToolOutput, ToolError> {
    debug!(program, args = ?args, "running tool");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?,
        Err(_) => {
            return Err(ToolError::Timeout {
                program: program.to_string(),
                timeout,
            });
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        let status = output
            .status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        return Err(ToolError::Failed {
            program: program.to_string(),
            status,
            stderr: summarize_stderr(&stderr),
        });
    }

    Ok(ToolOutput { stdout, stderr })
}

/// Keeps the lines mentioning an error, or the last line when none do.
fn summarize_stderr(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let error_lines: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|l| l.to_ascii_lowercase().contains("error"))
        .collect();

    if error_lines.is_empty() {
        lines.last().copied().unwrap_or_default().to_string()
    } else {
        error_lines.join("\n")
    }
}
