//! Suite runner and report
//!
//! Cases are plain functions taking the executable under test. Each runs in
//! registration order; an `Err` or a panic (failed assertion) marks the case
//! failed without stopping the suite.

use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Signature of a conformance case
pub type CaseFn = fn(&Path) -> anyhow::Result<()>;

/// A named conformance case
#[derive(Clone, Copy)]
pub struct Case {
    pub name: &'static str,
    pub run: CaseFn,
}

/// Ordered collection of cases
#[derive(Default)]
pub struct Suite {
    cases: Vec<Case>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case(mut self, name: &'static str, run: CaseFn) -> Self {
        self.cases.push(Case { name, run });
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.cases.iter().map(|c| c.name)
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    /// Run every case whose name contains `filter`
    ///
    /// `interrupted` is checked between cases; once it returns true the
    /// remaining cases are skipped and the report is marked interrupted.
    pub fn run(
        &self,
        executable: &Path,
        filter: Option<&str>,
        interrupted: impl Fn() -> bool,
    ) -> Report {
        let mut report = Report {
            executable: executable.display().to_string(),
            ..Report::default()
        };

        for case in &self.cases {
            if filter.is_some_and(|f| !case.name.contains(f)) {
                continue;
            }
            if interrupted() {
                info!(case = case.name, "interrupted, skipping remaining cases");
                report.interrupted = true;
                break;
            }

            debug!(case = case.name, "running");
            let outcome = run_case(case, executable);
            info!(case = case.name, passed = outcome.passed, "finished");
            report.outcomes.push(outcome);
        }

        report
    }
}

fn run_case(case: &Case, executable: &Path) -> CaseOutcome {
    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| (case.run)(executable)));
    let duration_ms = started.elapsed().as_millis() as u64;

    let message = match result {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("{:#}", e)),
        Err(payload) => Some(panic_message(payload.as_ref())),
    };

    CaseOutcome {
        name: case.name.to_string(),
        passed: message.is_none(),
        message,
        duration_ms,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "case panicked".to_string()
    }
}

/// Result of a single case
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CaseOutcome {
    pub name: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub duration_ms: u64,
}

/// Outcome of a suite run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub executable: String,
    pub outcomes: Vec<CaseOutcome>,
    pub interrupted: bool,
}

impl Report {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.passed()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.outcomes.iter().filter(|o| !o.passed)
    }

    /// 0 when nothing failed and the run was not interrupted
    pub fn exit_code(&self) -> i32 {
        if self.failed() == 0 && !self.interrupted {
            0
        } else {
            1
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            let mark = if outcome.passed { '✓' } else { '✗' };
            writeln!(f, "{} {}", mark, outcome.name)?;
        }

        writeln!(f)?;
        writeln!(f, "{}", "=".repeat(50))?;
        writeln!(f, "Tests run: {}", self.total())?;
        writeln!(f, "Passed: {}", self.passed())?;
        writeln!(f, "Failed: {}", self.failed())?;
        if self.interrupted {
            writeln!(f, "Interrupted: remaining cases skipped")?;
        }

        if self.failed() > 0 {
            writeln!(f)?;
            writeln!(f, "Failures:")?;
            for outcome in self.failures() {
                writeln!(
                    f,
                    "  {}: {}",
                    outcome.name,
                    outcome.message.as_deref().unwrap_or("")
                )?;
            }
        }

        Ok(())
    }
}
