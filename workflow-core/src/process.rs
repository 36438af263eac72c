//! External process execution
//!
//! Every git/gh/tmux/find invocation goes through this module. A child is
//! awaited to completion before the caller proceeds; only filesystem scans
//! carry a timeout.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::{Error, Result};

/// Captured result of a finished child process
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Standard output, lossily decoded
    pub stdout: String,
    /// Standard error, lossily decoded
    pub stderr: String,
    /// Exit code (-1 when terminated by a signal)
    pub exit_code: i32,
}

impl CommandOutput {
    /// Whether the process exited with status 0
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Best single line describing a failure, preferring `error:` lines
    pub fn error_line(&self) -> String {
        best_error_line(&self.stderr)
    }
}

fn build(program: &str, args: &[&str], cwd: Option<&Path>) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd
}

fn spawn_error(program: &str, err: std::io::Error) -> Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        Error::command(program, format!("`{}` not found on PATH", program))
    } else {
        Error::command(program, err.to_string())
    }
}

fn into_output(output: std::process::Output) -> CommandOutput {
    CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    }
}

/// Run a command and capture its output.
///
/// A nonzero exit is not an error here; only a spawn failure is.
pub async fn run(program: &str, args: &[&str], cwd: Option<&Path>) -> Result<CommandOutput> {
    debug!(program, ?args, cwd = ?cwd, "Running command");

    let output = build(program, args, cwd)
        .output()
        .await
        .map_err(|e| spawn_error(program, e))?;

    Ok(into_output(output))
}

/// Run a command and return its stdout with trailing whitespace trimmed.
///
/// Nonzero exit and spawn failure collapse into `Error::Command`.
pub async fn run_captured(program: &str, args: &[&str], cwd: Option<&Path>) -> Result<String> {
    let output = run(program, args, cwd).await?;
    if !output.success() {
        return Err(Error::command(program, output.error_line()));
    }
    Ok(output.stdout.trim_end().to_string())
}

/// Run a command with a hard wall-clock limit.
///
/// The child is killed when the limit expires.
pub async fn run_with_timeout(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    limit: Duration,
) -> Result<CommandOutput> {
    debug!(program, ?args, timeout_secs = limit.as_secs(), "Running command with timeout");

    let child = build(program, args, cwd)
        .spawn()
        .map_err(|e| spawn_error(program, e))?;

    match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(into_output(output)),
        Ok(Err(e)) => Err(Error::command(program, e.to_string())),
        Err(_) => Err(Error::Timeout {
            program: program.to_string(),
            seconds: limit.as_secs(),
        }),
    }
}

/// Run a command with inherited stdio, for interactive children (claude, gh clone)
pub async fn run_interactive(program: &str, args: &[&str], cwd: Option<&Path>) -> Result<i32> {
    debug!(program, ?args, "Running interactive command");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    let status = cmd.status().await.map_err(|e| spawn_error(program, e))?;
    Ok(status.code().unwrap_or(-1))
}

/// Replace the current process image with `program`.
///
/// This is a terminal transfer of control: on success nothing after this
/// call runs in this process. The returned error describes why exec failed.
#[cfg(unix)]
pub fn replace_process(program: &str, args: &[&str]) -> Error {
    use std::os::unix::process::CommandExt;

    debug!(program, ?args, "Replacing process");
    let err = std::process::Command::new(program).args(args).exec();
    spawn_error(program, err)
}

/// Check whether a binary can be found on PATH
pub fn binary_on_path(bin: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(bin).is_file()))
        .unwrap_or(false)
}

/// Pick the most useful line from a stderr dump
pub fn best_error_line(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if let Some(line) = lines
        .iter()
        .find(|line| line.to_ascii_lowercase().starts_with("error:"))
    {
        return (*line).to_string();
    }

    lines
        .last()
        .map(|line| (*line).to_string())
        .unwrap_or_else(|| "unknown error".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_reports_nonzero_without_error() {
        let output = run("sh", &["-c", "echo out; echo err >&2; exit 3"], None)
            .await
            .unwrap();
        assert_eq!(output.exit_code, 3);
        assert!(!output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.error_line(), "err");
    }

    #[tokio::test]
    async fn test_run_captured_trims_trailing_whitespace() {
        let out = run_captured("sh", &["-c", "printf '  hello \\n\\n'"], None)
            .await
            .unwrap();
        assert_eq!(out, "  hello");
    }

    #[tokio::test]
    async fn test_run_captured_collapses_failure() {
        let err = run_captured("sh", &["-c", "exit 1"], None).await.unwrap_err();
        assert!(matches!(err, Error::Command { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_is_command_error() {
        let err = run("definitely-not-a-real-binary-xyz", &[], None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Command { .. }));
    }

    #[tokio::test]
    async fn test_run_with_timeout_expires() {
        let err = run_with_timeout("sleep", &["5"], None, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_run_in_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let out = run_captured("pwd", &[], Some(dir.path())).await.unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(Path::new(&out).canonicalize().unwrap(), expected);
    }

    #[test]
    fn test_best_error_line_prefers_error_prefix() {
        let stderr = "hint: something\nerror: the real problem\nmore noise\n";
        assert_eq!(best_error_line(stderr), "error: the real problem");
        assert_eq!(best_error_line("\n\n"), "unknown error");
        assert_eq!(best_error_line("first\nlast\n"), "last");
    }
}
