//! Response-boundary strategies
//!
//! The child has no framing: a command may print zero, one or many lines, and
//! the harness cannot tell where one reply ends. A [`DrainPolicy`] decides how
//! much of the [`OutputQueue`] belongs to the command just sent. Exactly one
//! policy is active per harness; they are not meant to be mixed.

use crate::error::{HarnessError, Result};
use crate::relay::{OutputQueue, Pull};
use std::time::{Duration, Instant};
use tracing::debug;

/// Lines collected for one command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    lines: Vec<String>,
    eof: bool,
}

impl Response {
    pub fn new(lines: Vec<String>, eof: bool) -> Self {
        Self { lines, eof }
    }

    /// Response of a command sent without waiting
    pub fn empty() -> Self {
        Self::default()
    }

    /// Lines in arrival order, trailing newlines preserved
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Whether the child's output closed while collecting
    pub fn eof(&self) -> bool {
        self.eof
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn first(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }

    /// First line without its line terminator
    pub fn trimmed(&self) -> Option<&str> {
        self.first().map(|line| line.trim_end_matches(&['\r', '\n'][..]))
    }

    /// All lines concatenated
    pub fn text(&self) -> String {
        self.lines.concat()
    }

    /// Whether any line contains `fragment`
    pub fn contains(&self, fragment: &str) -> bool {
        self.lines.iter().any(|line| line.contains(fragment))
    }
}

impl IntoIterator for Response {
    type Item = String;
    type IntoIter = std::vec::IntoIter<String>;

    fn into_iter(self) -> Self::IntoIter {
        self.lines.into_iter()
    }
}

/// Strategy that decides where a command's response ends
pub trait DrainPolicy: Send {
    /// Short name for logs and reports
    fn name(&self) -> &'static str;

    /// Collect the response to `command` from `queue`
    ///
    /// `timeout` bounds the wait for the response to start; expiry is a
    /// `ResponseTimeout`, never a hang.
    fn collect(
        &self,
        queue: &mut OutputQueue,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<Response>;
}

/// Block for the first line, then take only what is already queued
///
/// This approximates "wait for the reply to start, keep the rest of the same
/// burst". Output the child flushes noticeably later is left in the queue and
/// shows up at the front of the next response. A non-zero `settle` tolerates
/// that much silence between lines of one burst.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrainReady {
    settle: Duration,
}

impl DrainReady {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settle(settle: Duration) -> Self {
        Self { settle }
    }
}

impl DrainPolicy for DrainReady {
    fn name(&self) -> &'static str {
        "drain-ready"
    }

    fn collect(
        &self,
        queue: &mut OutputQueue,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        let mut lines = match queue.pull_blocking(timeout) {
            Pull::Line(line) => vec![line],
            Pull::Eof => return Ok(Response::new(Vec::new(), true)),
            Pull::Empty => return Err(timed_out(command, timeout)),
        };

        let eof = loop {
            match queue.pull_within(self.settle) {
                Pull::Line(line) => lines.push(line),
                Pull::Eof => break true,
                Pull::Empty => break false,
            }
        };

        debug!(command, lines = lines.len(), eof, "drained response");
        Ok(Response::new(lines, eof))
    }
}

/// Scan line by line until the prompt marker reappears
///
/// The reply is the text after the marker's last occurrence on the matching
/// line; lines before it are discarded. Only ever yields one line, and it
/// requires the target to print a stable prompt after every command.
#[derive(Debug, Clone)]
pub struct PromptMarker {
    marker: String,
}

impl PromptMarker {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Strip everything up to and including the last marker, keeping one line
    fn extract(&self, line: &str) -> Option<String> {
        let pos = line.rfind(&self.marker)?;
        let rest = &line[pos + self.marker.len()..];
        let reply = match rest.find('\n') {
            Some(nl) => &rest[..=nl],
            None => rest,
        };
        Some(reply.to_string())
    }
}

impl DrainPolicy for PromptMarker {
    fn name(&self) -> &'static str {
        "prompt-marker"
    }

    fn collect(
        &self,
        queue: &mut OutputQueue,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut skipped = 0usize;

        loop {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            match queue.pull_blocking(remaining) {
                Pull::Line(line) => match self.extract(&line) {
                    Some(reply) => {
                        debug!(command, skipped, "prompt marker found");
                        return Ok(Response::new(vec![reply], false));
                    }
                    None => skipped += 1,
                },
                Pull::Eof => return Ok(Response::new(Vec::new(), true)),
                Pull::Empty => return Err(timed_out(command, timeout)),
            }
        }
    }
}

fn timed_out(command: &str, timeout: Option<Duration>) -> HarnessError {
    HarnessError::ResponseTimeout {
        command: command.to_string(),
        timeout: timeout.unwrap_or_default(),
    }
}
