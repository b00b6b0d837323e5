//! Command-response synchronizer
//!
//! [`ShellHarness`] is the surface conformance tests talk to. It writes one
//! command line to the child's stdin and uses its [`DrainPolicy`] to decide
//! which queued output lines answer that command.
//!
//! ```ignore
//! use shell_conform::{HarnessConfig, ShellHarness};
//!
//! let mut shell = ShellHarness::new("./target/release/rush", HarnessConfig::default());
//! shell.start_plain()?;
//! shell.execute_quiet("cd /tmp")?;
//! assert_eq!(shell.run("pwd")?.trimmed(), Some("/tmp"));
//! shell.stop();
//! ```

use crate::config::HarnessConfig;
use crate::error::{HarnessError, Result};
use crate::policy::{DrainPolicy, Response};
use crate::process::{Liveness, Supervisor};
use crate::relay::{self, OutputQueue};
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ChildStdin;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Live pipes of a started child
struct Session {
    stdin: ChildStdin,
    queue: OutputQueue,
    relay: JoinHandle<()>,
}

/// Drives one interactive child process over stdin/stdout
pub struct ShellHarness {
    config: HarnessConfig,
    policy: Box<dyn DrainPolicy>,
    supervisor: Supervisor,
    session: Option<Session>,
}

impl ShellHarness {
    /// Harness for `executable`; nothing is spawned until `start`
    pub fn new(executable: impl Into<PathBuf>, config: HarnessConfig) -> Self {
        let policy = config.build_policy();
        let supervisor = Supervisor::new(executable, &config);
        Self {
            config,
            policy,
            supervisor,
            session: None,
        }
    }

    /// Replace the draining strategy (e.g. with a framed protocol)
    pub fn with_policy(mut self, policy: Box<dyn DrainPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn executable(&self) -> &Path {
        self.supervisor.executable()
    }

    /// Spawn the child with `env` merged over the ambient environment
    pub fn start<I, K, V>(&mut self, env: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.stop();

        let spawned = self.supervisor.start(env)?;
        let (queue, relay) = match relay::spawn(spawned.output) {
            Ok(parts) => parts,
            Err(e) => {
                self.supervisor.stop();
                return Err(e.into());
            }
        };

        self.session = Some(Session {
            stdin: spawned.stdin,
            queue,
            relay,
        });
        Ok(())
    }

    /// Spawn the child with the ambient environment only
    pub fn start_plain(&mut self) -> Result<()> {
        self.start(std::iter::empty::<(&str, &str)>())
    }

    /// Send `command` and collect its response
    ///
    /// With `suppress_wait` the line is written and an empty response comes
    /// back immediately without touching the output queue. Otherwise the
    /// active policy blocks (up to the configured timeout) for the reply.
    pub fn execute(&mut self, command: &str, suppress_wait: bool) -> Result<Response> {
        let session = self.session.as_mut().ok_or(HarnessError::NotStarted)?;

        debug!(command, suppress_wait, "send");
        writeln!(session.stdin, "{}", command)
            .and_then(|_| session.stdin.flush())
            .map_err(|e| HarnessError::from_write(command, e))?;

        if suppress_wait {
            return Ok(Response::empty());
        }

        let started = Instant::now();
        let result = self
            .policy
            .collect(&mut session.queue, command, self.config.response_timeout);

        match &result {
            Ok(response) => debug!(
                command,
                lines = response.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "response"
            ),
            Err(e) => warn!(command, error = %e, "no response"),
        }
        result
    }

    /// Send `command` and wait for its response
    pub fn run(&mut self, command: &str) -> Result<Response> {
        self.execute(command, false)
    }

    /// Send `command` without waiting for output
    pub fn execute_quiet(&mut self, command: &str) -> Result<()> {
        self.execute(command, true).map(|_| ())
    }

    /// Drop any output still queued from earlier commands
    pub fn discard_pending(&mut self) -> Result<usize> {
        let session = self.session.as_mut().ok_or(HarnessError::NotStarted)?;
        Ok(session.queue.discard_ready())
    }

    pub fn pid(&self) -> Option<u32> {
        self.supervisor.pid()
    }

    /// Non-blocking: has the child not exited yet?
    pub fn is_alive(&mut self) -> bool {
        self.supervisor.is_alive()
    }

    pub fn liveness(&mut self) -> Liveness {
        self.supervisor.liveness()
    }

    /// Wait up to `timeout` for the child to exit on its own
    pub fn wait_for_exit(&mut self, timeout: Duration) -> bool {
        self.supervisor.wait_for_exit(timeout)
    }

    /// Tear the child down; safe to call repeatedly
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            self.supervisor.stop();
            return;
        };

        // Closing stdin first lets well-behaved REPLs exit on EOF
        drop(session.stdin);
        self.supervisor.stop();

        // The relay ends once every writer of the pipe is gone. A grandchild
        // that inherited the pipe can keep it open; don't hang on that.
        let deadline = Instant::now() + self.config.stop_grace;
        while !session.relay.is_finished() && Instant::now() < deadline {
            std::thread::sleep(self.config.poll_interval);
        }
        if session.relay.is_finished() {
            let _ = session.relay.join();
        } else {
            debug!("relay still reading after stop, detaching");
        }
    }
}

impl Drop for ShellHarness {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyKind;

    #[test]
    fn test_execute_before_start() {
        let mut shell = ShellHarness::new("/bin/sh", HarnessConfig::default());
        let err = shell.execute("echo hi", false).unwrap_err();
        assert!(matches!(err, HarnessError::NotStarted));

        let err = shell.execute("echo hi", true).unwrap_err();
        assert!(matches!(err, HarnessError::NotStarted));
        assert!(matches!(shell.discard_pending(), Err(HarnessError::NotStarted)));
    }

    #[test]
    fn test_stop_without_start() {
        let mut shell = ShellHarness::new("/bin/sh", HarnessConfig::default());
        shell.stop();
        shell.stop();
        assert!(!shell.is_alive());
        assert_eq!(shell.liveness(), Liveness::NotStarted);
    }

    #[test]
    fn test_policy_follows_config() {
        let shell = ShellHarness::new("/bin/sh", HarnessConfig::default());
        assert_eq!(shell.policy_name(), "drain-ready");

        let config = HarnessConfig::default().with_policy(PolicyKind::PromptMarker);
        let shell = ShellHarness::new("/bin/sh", config);
        assert_eq!(shell.policy_name(), "prompt-marker");
    }

    #[test]
    fn test_launch_error_leaves_harness_unstarted() {
        let mut shell = ShellHarness::new("/no/such/shell", HarnessConfig::default());
        assert!(matches!(shell.start_plain(), Err(HarnessError::Launch { .. })));
        assert!(matches!(shell.run("pwd"), Err(HarnessError::NotStarted)));
    }
}
