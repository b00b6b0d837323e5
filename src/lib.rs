// Library interface for shell-conform
// Drives an interactive line-oriented program over pipes so conformance
// tests can assert on what it prints.

pub mod cases;
pub mod config;
pub mod error;
pub mod harness;
pub mod logging;
pub mod policy;
pub mod process;
pub mod relay;
pub mod runner;
pub mod sandbox;
pub mod signal;

pub use config::{HarnessConfig, PolicyKind};
pub use error::{HarnessError, Result};
pub use harness::ShellHarness;
pub use policy::{DrainPolicy, DrainReady, PromptMarker, Response};
pub use process::Liveness;
pub use sandbox::Sandbox;
