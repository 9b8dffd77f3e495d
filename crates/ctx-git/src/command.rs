//! Running `git` with a deadline.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{GitError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs `git` subcommands in one working directory, killing any call that
/// outlives `timeout`.
#[derive(Debug, Clone)]
pub struct Git {
    cwd: PathBuf,
    timeout: Duration,
}

impl Git {
    pub fn new(cwd: impl Into<PathBuf>, timeout: Duration) -> Self {
        Git {
            cwd: cwd.into(),
            timeout,
        }
    }

    /// The same runner pointed at another directory.
    pub fn at(&self, cwd: &Path) -> Self {
        Git {
            cwd: cwd.to_path_buf(),
            timeout: self.timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `git <args>` and return its stdout.
    ///
    /// Every call allows the `file` transport so local repositories work as
    /// sources and as submodules.
    pub fn run(&self, args: &[&str]) -> Result<String> {
        let joined = args.join(" ");
        debug!(cwd = %self.cwd.display(), args = %joined, "running git");

        let mut child = Command::new("git")
            .args(["-c", "protocol.file.allow=always"])
            .args(args)
            .current_dir(&self.cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(GitError::Spawn)?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_with_deadline(&mut child, self.timeout)? {
            Some(status) => status,
            None => {
                // Best effort: the process may already have exited.
                let _ = child.kill();
                let _ = child.wait();
                return Err(GitError::Timeout {
                    args: joined,
                    timeout: self.timeout,
                });
            }
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();
        if !status.success() {
            return Err(GitError::Failed {
                args: joined,
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(stdout)
    }

    /// Like [`Git::run`], but a non-zero exit is `Ok(None)`.
    pub fn try_run(&self, args: &[&str]) -> Result<Option<String>> {
        match self.run(args) {
            Ok(out) => Ok(Some(out)),
            Err(GitError::Failed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Whether a `git` executable can be started.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Duration,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failing_command_reports_stderr() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let git = Git::new(dir.path(), Duration::from_secs(30));
        let err = git.run(&["rev-parse", "HEAD"]).unwrap_err();
        assert!(matches!(err, GitError::Failed { .. }));
        assert!(git.try_run(&["rev-parse", "HEAD"]).unwrap().is_none());
    }

    #[test]
    fn successful_command_returns_stdout() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let git = Git::new(dir.path(), Duration::from_secs(30));
        let out = git.run(&["--version"]).unwrap();
        assert!(out.starts_with("git version"));
    }

    #[cfg(unix)]
    #[test]
    fn stalled_call_is_killed_at_the_deadline() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let git = Git::new(dir.path(), Duration::from_millis(200));
        let started = Instant::now();
        let err = git
            .run(&["-c", "alias.stall=!sleep 10", "stall"])
            .unwrap_err();
        match err {
            GitError::Timeout { timeout, args } => {
                assert_eq!(timeout, Duration::from_millis(200));
                assert!(args.ends_with("stall"));
            }
            other => panic!("expected timeout, got {other}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
