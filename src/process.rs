//! Process supervisor for the program under test
//!
//! Owns the only handle to the child. The child runs from the directory its
//! path names (links are not followed, and PWD says so) with the ambient
//! environment plus caller overrides, stdin piped, and
//! stdout/stderr sharing a single `os_pipe` so the relay sees one merged
//! stream in the order the child wrote it.

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use os_pipe::PipeReader;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Liveness of the supervised child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    NotStarted,
    Running,
    /// Exit code, or `None` when the child was killed by a signal
    Exited(Option<i32>),
}

/// Pipe ends handed to the caller after a successful spawn
pub struct Spawned {
    pub stdin: ChildStdin,
    pub output: PipeReader,
}

/// Spawns, watches and tears down one child process
pub struct Supervisor {
    executable: PathBuf,
    stop_grace: Duration,
    poll_interval: Duration,
    child: Option<Child>,
    last_status: Option<ExitStatus>,
}

impl Supervisor {
    pub fn new(executable: impl Into<PathBuf>, config: &HarnessConfig) -> Self {
        Self {
            executable: executable.into(),
            stop_grace: config.stop_grace,
            poll_interval: config.poll_interval,
            child: None,
            last_status: None,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Spawn the executable with `env` layered over the ambient environment
    ///
    /// A child that is still running from a previous `start` is stopped first.
    pub fn start<I, K, V>(&mut self, env: I) -> Result<Spawned>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        if self.child.is_some() {
            debug!("restarting: stopping previous child");
            self.stop();
        }

        // Symlinks stay unresolved: multi-call binaries dispatch on argv[0]
        let path = resolve_executable(&self.executable)?;
        let workdir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"));

        let launch_err = |source: io::Error| HarnessError::Launch {
            path: self.executable.clone(),
            source,
        };

        let (output, writer) = os_pipe::pipe()?;
        let writer_err = writer.try_clone()?;

        let mut command = Command::new(&path);
        command
            .arg0(&self.executable)
            .current_dir(&workdir)
            .env("PWD", &workdir)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(writer)
            .stderr(writer_err);

        let mut child = command.spawn().map_err(launch_err)?;
        // Our copies of the write end live in `command`; they must close or
        // the relay never sees end of stream.
        drop(command);

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| launch_err(io::Error::new(io::ErrorKind::Other, "stdin not piped")))?;

        debug!(pid = child.id(), path = %path.display(), workdir = %workdir.display(), "spawned child");
        self.last_status = None;
        self.child = Some(child);

        Ok(Spawned { stdin, output })
    }

    /// Process id of the running child
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    /// Non-blocking check that the child has not exited
    pub fn is_alive(&mut self) -> bool {
        self.liveness() == Liveness::Running
    }

    pub fn liveness(&mut self) -> Liveness {
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(None) => return Liveness::Running,
                Ok(Some(status)) => self.last_status = Some(status),
                Err(e) => {
                    // Unreapable: nothing more we can learn about it
                    warn!(error = %e, "try_wait failed");
                    return Liveness::Exited(None);
                }
            }
        }

        match self.last_status {
            Some(status) => Liveness::Exited(status.code()),
            None => Liveness::NotStarted,
        }
    }

    /// Wait up to `timeout` for the child to exit on its own
    ///
    /// Returns true if it exited (or was never started). Never fails on
    /// timeout.
    pub fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if !self.is_alive() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(self.poll_interval.min(deadline - now));
        }
    }

    /// Terminate the child: SIGTERM, grace period, then SIGKILL
    ///
    /// Idempotent; a no-op when nothing is running.
    pub fn stop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };

        if let Ok(Some(status)) = child.try_wait() {
            self.last_status = Some(status);
            return;
        }

        let pid = child.id();
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }

        let deadline = Instant::now() + self.stop_grace;
        while Instant::now() < deadline {
            if let Ok(Some(status)) = child.try_wait() {
                debug!(pid, code = ?status.code(), "child terminated");
                self.last_status = Some(status);
                return;
            }
            std::thread::sleep(self.poll_interval);
        }

        warn!(pid, grace_ms = self.stop_grace.as_millis() as u64, "child ignored SIGTERM, killing");
        let _ = child.kill();
        self.last_status = child.wait().ok();
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Make `path` absolute without following links, after checking that it
/// leads to an executable regular file
fn resolve_executable(path: &Path) -> Result<PathBuf> {
    let launch_err = |source: io::Error| HarnessError::Launch {
        path: path.to_path_buf(),
        source,
    };

    let target = fs::canonicalize(path).map_err(launch_err)?;
    let metadata = fs::metadata(&target).map_err(launch_err)?;

    if !metadata.is_file() {
        return Err(launch_err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a regular file",
        )));
    }
    if metadata.permissions().mode() & 0o111 == 0 {
        return Err(launch_err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "not executable",
        )));
    }

    std::path::absolute(path).map_err(launch_err)
}
