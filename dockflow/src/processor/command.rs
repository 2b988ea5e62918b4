//! Shared external-command invocation for processor adapters.

use crate::errors::ProcessorError;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// Description of one external tool invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// The program to run (resolved via `PATH` unless absolute).
    pub program: String,
    /// Arguments, already rendered.
    pub args: Vec<String>,
    /// Working directory override. Some preparation tools resolve their
    /// inputs relative to the current directory.
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    /// Creates a spec for `program` with the given arguments.
    #[must_use]
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
        }
    }

    /// Overrides the working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

/// Captured output of a successful tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr (tools often log progress here).
    pub stderr: String,
}

/// Runs an external tool to completion, capturing its output.
///
/// A non-zero exit becomes a [`ProcessorError`] carrying a stderr excerpt.
/// Wall-clock limits are enforced by the stage runner wrapping this future
/// in a timeout; `kill_on_drop` ensures an abandoned invocation's child
/// process is reaped rather than orphaned.
pub async fn run_tool(tool: &str, spec: &CommandSpec) -> Result<ToolOutput, ProcessorError> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }

    let output = command
        .output()
        .await
        .map_err(|e| ProcessorError::spawn(tool, format!("{}: {e}", spec.program)))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(
            ProcessorError::non_zero_exit(tool, output.status.code()).with_stderr(&stderr)
        );
    }

    Ok(ToolOutput { stdout, stderr })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProcessorErrorKind;

    #[tokio::test]
    async fn test_run_tool_captures_stdout() {
        let spec = CommandSpec::new("echo", ["docked"]);
        let output = run_tool("echo", &spec).await.unwrap();
        assert_eq!(output.stdout.trim(), "docked");
    }

    #[tokio::test]
    async fn test_run_tool_nonzero_exit() {
        let spec = CommandSpec::new("sh", ["-c", "echo boom >&2; exit 3"]);
        let err = run_tool("sh", &spec).await.unwrap_err();
        assert_eq!(err.kind, ProcessorErrorKind::NonZeroExit(Some(3)));
        assert_eq!(err.stderr_excerpt.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_run_tool_missing_program() {
        let spec = CommandSpec::new("definitely-not-a-real-tool", Vec::<String>::new());
        let err = run_tool("missing", &spec).await.unwrap_err();
        assert!(matches!(err.kind, ProcessorErrorKind::Spawn(_)));
    }

    #[tokio::test]
    async fn test_run_tool_respects_cwd() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("probe.txt"), "x").unwrap();
        let spec = CommandSpec::new("ls", Vec::<String>::new()).with_cwd(dir.path());
        let output = run_tool("ls", &spec).await.unwrap();
        assert!(output.stdout.contains("probe.txt"));
    }
}
