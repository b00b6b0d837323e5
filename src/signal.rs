//! Interrupt handling for the suite runner
//!
//! SIGINT/SIGTERM/SIGHUP only raise a flag; the runner checks it between
//! cases so the case in flight can tear its child down through `Drop`
//! instead of leaving orphans behind.

use anyhow::Result;
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::thread;

/// Signal state shared between the runner and the signal thread
#[derive(Clone, Default)]
pub struct SignalHandler {
    shutdown_flag: Arc<AtomicBool>,
    signal_number: Arc<AtomicI32>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Setup signal handlers for SIGINT, SIGTERM, and SIGHUP
    pub fn setup(&self) -> Result<()> {
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;
        let handler = self.clone();

        thread::Builder::new()
            .name("shell-conform-signals".to_string())
            .spawn(move || {
                for sig in signals.forever() {
                    handler.record(sig);
                }
            })?;

        Ok(())
    }

    fn record(&self, sig: i32) {
        self.signal_number.store(sig, Ordering::SeqCst);
        self.shutdown_flag.store(true, Ordering::SeqCst);
    }

    /// Check if shutdown was requested
    pub fn should_shutdown(&self) -> bool {
        self.shutdown_flag.load(Ordering::SeqCst)
    }

    /// Get the signal number that was received (0 if none)
    pub fn signal_number(&self) -> i32 {
        self.signal_number.load(Ordering::SeqCst)
    }

    /// Get the exit code for the received signal
    pub fn exit_code(&self) -> i32 {
        match self.signal_number() {
            SIGINT => 130,
            SIGTERM => 143,
            SIGHUP => 129,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_handler_creation() {
        let handler = SignalHandler::new();
        assert!(!handler.should_shutdown());
        assert_eq!(handler.signal_number(), 0);
        assert_eq!(handler.exit_code(), 1);
    }

    #[test]
    fn test_signal_handler_setup() {
        let handler = SignalHandler::new();
        assert!(handler.setup().is_ok());
    }

    #[test]
    fn test_exit_codes() {
        let handler = SignalHandler::new();

        handler.record(SIGINT);
        assert!(handler.should_shutdown());
        assert_eq!(handler.exit_code(), 130);

        handler.record(SIGTERM);
        assert_eq!(handler.exit_code(), 143);

        handler.record(SIGHUP);
        assert_eq!(handler.exit_code(), 129);
    }

    #[test]
    fn test_clones_share_state() {
        let handler = SignalHandler::new();
        let observer = handler.clone();
        handler.record(SIGTERM);
        assert!(observer.should_shutdown());
        assert_eq!(observer.signal_number(), SIGTERM);
    }
}
