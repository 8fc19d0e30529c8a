//! Local execution facility behind CONSOLE commands.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

pub type ExecFuture<'a> = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

/// Runs a command line and yields captured stdout, or the failure text.
pub trait LocalExecutor: Send + Sync {
    fn run<'a>(&'a self, line: &'a str) -> ExecFuture<'a>;
}

/// `<shell> -c <line>` with a wall-clock limit.
///
/// The child is spawned with `kill_on_drop`, so a timeout or a dropped
/// future reaps the process and closes its pipes.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: String,
    timeout: Duration,
}

impl ShellExecutor {
    pub fn new(shell: impl Into<String>, timeout: Duration) -> Self {
        Self { shell: shell.into(), timeout }
    }
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new("sh", Duration::from_secs(30))
    }
}

impl LocalExecutor for ShellExecutor {
    fn run<'a>(&'a self, line: &'a str) -> ExecFuture<'a> {
        Box::pin(async move {
            let child = Command::new(&self.shell)
                .arg("-c")
                .arg(line)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| format!("failed to spawn '{}': {e}", self.shell))?;

            let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
                Ok(result) => result.map_err(|e| format!("command '{line}' failed: {e}"))?,
                Err(_) => {
                    tracing::warn!(line = %line, timeout_secs = self.timeout.as_secs(), "Console command timed out");
                    return Err(format!(
                        "command '{line}' timed out after {}s",
                        self.timeout.as_secs()
                    ));
                }
            };

            if output.status.success() {
                return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
            }
            Err(match output.status.code() {
                Some(code) => format!("command '{line}' returned non-zero exit status {code}"),
                None => format!("command '{line}' was terminated by a signal"),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_captures_stdout() {
        let exec = ShellExecutor::default();
        assert_eq!(exec.run("echo hello").await.unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let exec = ShellExecutor::default();
        let err = exec.run("exit 3").await.unwrap_err();
        assert_eq!(err, "command 'exit 3' returned non-zero exit status 3");
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let exec = ShellExecutor::new("sh", Duration::from_millis(200));
        let err = exec.run("sleep 5").await.unwrap_err();
        assert!(err.contains("timed out"), "got {err}");
    }

    #[tokio::test]
    async fn test_missing_shell() {
        let exec = ShellExecutor::new("/nonexistent/shell", Duration::from_secs(1));
        assert!(exec.run("true").await.unwrap_err().contains("failed to spawn"));
    }
}
