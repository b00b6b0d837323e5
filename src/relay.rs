//! Stream relay: moves the child's output into a queryable queue
//!
//! A single background thread blocks on `read_until` against the child's
//! merged stdout/stderr and forwards every line, newline included, onto an
//! unbounded channel. End of stream (or any read error) is forwarded as one
//! `Eof` item, after which the thread exits.
//!
//! The consumer side, [`OutputQueue`], never blocks unless asked to, which is
//! what lets the synchronizer ask "is there more right now?".

use std::io::{BufRead, BufReader, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, trace};

/// One item published by the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayItem {
    /// A line exactly as the child wrote it, including the trailing `\n`
    /// (the final line may lack one)
    Line(String),
    /// The output stream closed; nothing follows
    Eof,
}

/// Result of a single pull from the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pull {
    Line(String),
    /// End of stream has been reached. Sticky: every later pull sees it too
    Eof,
    /// Nothing arrived within the allowed wait
    Empty,
}

/// Start the relay thread over `source`
pub fn spawn<R>(source: R) -> std::io::Result<(OutputQueue, JoinHandle<()>)>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handle = thread::Builder::new()
        .name("shell-conform-relay".to_string())
        .spawn(move || relay_loop(source, tx))?;

    Ok((OutputQueue::new(rx), handle))
}

fn relay_loop<R: Read>(source: R, tx: Sender<RelayItem>) {
    let mut reader = BufReader::new(source);
    let mut buf = Vec::new();
    let mut lines = 0usize;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).into_owned();
                trace!(line = %line.trim_end(), "relay");
                lines += 1;
                if tx.send(RelayItem::Line(line)).is_err() {
                    // consumer dropped; nobody is listening anymore
                    debug!(lines, "relay receiver dropped");
                    return;
                }
            }
            Err(e) => {
                debug!(error = %e, "relay read failed, treating as end of stream");
                break;
            }
        }
    }

    debug!(lines, "relay reached end of stream");
    let _ = tx.send(RelayItem::Eof);
}

/// Consumer side of the relay channel
///
/// FIFO in arrival order. Once `Eof` has been observed it is latched and
/// returned by every subsequent pull, so a drain can never consume it.
#[derive(Debug)]
pub struct OutputQueue {
    rx: Receiver<RelayItem>,
    eof: bool,
}

impl OutputQueue {
    pub fn new(rx: Receiver<RelayItem>) -> Self {
        Self { rx, eof: false }
    }

    /// Whether end of stream has been observed
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Block for the next item, up to `timeout` (`None` waits indefinitely)
    pub fn pull_blocking(&mut self, timeout: Option<Duration>) -> Pull {
        if self.eof {
            return Pull::Eof;
        }

        let item = match timeout {
            Some(timeout) => match self.rx.recv_timeout(timeout) {
                Ok(item) => Some(item),
                Err(RecvTimeoutError::Timeout) => return Pull::Empty,
                Err(RecvTimeoutError::Disconnected) => None,
            },
            None => self.rx.recv().ok(),
        };

        self.settle(item)
    }

    /// Take the next item only if it is already queued
    pub fn pull_ready(&mut self) -> Pull {
        if self.eof {
            return Pull::Eof;
        }

        let item = match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) => return Pull::Empty,
            Err(TryRecvError::Disconnected) => None,
        };

        self.settle(item)
    }

    /// Take the next item, tolerating a short quiet period
    pub fn pull_within(&mut self, wait: Duration) -> Pull {
        if wait.is_zero() {
            self.pull_ready()
        } else {
            self.pull_blocking(Some(wait))
        }
    }

    /// Discard everything already queued, returning how many lines were dropped
    pub fn discard_ready(&mut self) -> usize {
        let mut dropped = 0;
        while let Pull::Line(_) = self.pull_ready() {
            dropped += 1;
        }
        dropped
    }

    fn settle(&mut self, item: Option<RelayItem>) -> Pull {
        match item {
            Some(RelayItem::Line(line)) => Pull::Line(line),
            // A vanished sender means the relay is gone; same as end of stream
            Some(RelayItem::Eof) | None => {
                self.eof = true;
                Pull::Eof
            }
        }
    }
}
