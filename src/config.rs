//! Harness configuration
//!
//! Settings come from built-in defaults, optionally overridden by a
//! `KEY=value` file and then by the process environment:
//! - SHELL_CONFORM_TIMEOUT_MS (first-line wait, 0 = wait forever)
//! - SHELL_CONFORM_STOP_GRACE_MS (SIGTERM grace period before SIGKILL)
//! - SHELL_CONFORM_POLL_MS (liveness poll interval)
//! - SHELL_CONFORM_POLICY (drain, prompt)
//! - SHELL_CONFORM_SETTLE_MS (extra wait between burst lines for `drain`)
//! - SHELL_CONFORM_PROMPT (marker for `prompt`)

use crate::policy::{DrainPolicy, DrainReady, PromptMarker};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Prompt marker most shells print before reading a line
pub const DEFAULT_PROMPT_MARKER: &str = "$ ";

/// Which response-boundary strategy a harness uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyKind {
    /// Block for the first line, then take whatever is already queued
    #[default]
    DrainReady,
    /// Block until a line carrying the prompt marker shows up
    PromptMarker,
}

impl PolicyKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "drain" | "drain-ready" => Some(PolicyKind::DrainReady),
            "prompt" | "prompt-marker" => Some(PolicyKind::PromptMarker),
            _ => None,
        }
    }
}

/// Tunables for one `ShellHarness`
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Upper bound on the wait for a response's first line (`None` blocks forever)
    pub response_timeout: Option<Duration>,
    /// How long `stop()` waits after SIGTERM before escalating to SIGKILL
    pub stop_grace: Duration,
    /// Sleep between liveness polls
    pub poll_interval: Duration,
    /// Response-boundary strategy
    pub policy: PolicyKind,
    /// Quiet period tolerated between lines of one burst (`DrainReady` only)
    pub settle: Duration,
    /// Marker searched for by `PromptMarker`
    pub prompt_marker: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            response_timeout: Some(Duration::from_secs(5)),
            stop_grace: Duration::from_secs(2),
            poll_interval: Duration::from_millis(10),
            policy: PolicyKind::DrainReady,
            settle: Duration::ZERO,
            prompt_marker: DEFAULT_PROMPT_MARKER.to_string(),
        }
    }
}

impl HarnessConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Parse configuration from a specific file
    pub fn from_file(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        Some(Self::parse(&content))
    }

    /// Parse configuration from content string
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let line = line.strip_prefix("export ").unwrap_or(line);

            if let Some((key, value)) = parse_assignment(line) {
                config.apply(&key, &unquote(&value));
            }
        }

        config
    }

    /// Overlay any SHELL_CONFORM_* variables present in the environment
    pub fn apply_env(&mut self) {
        for key in KEYS {
            if let Ok(value) = std::env::var(key) {
                self.apply(key, &value);
            }
        }
    }

    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "SHELL_CONFORM_TIMEOUT_MS" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.response_timeout = (ms > 0).then(|| Duration::from_millis(ms));
                }
            }
            "SHELL_CONFORM_STOP_GRACE_MS" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.stop_grace = Duration::from_millis(ms);
                }
            }
            "SHELL_CONFORM_POLL_MS" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.poll_interval = Duration::from_millis(ms.max(1));
                }
            }
            "SHELL_CONFORM_POLICY" => {
                if let Some(kind) = PolicyKind::from_str(value) {
                    self.policy = kind;
                }
            }
            "SHELL_CONFORM_SETTLE_MS" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.settle = Duration::from_millis(ms);
                }
            }
            "SHELL_CONFORM_PROMPT" => {
                if !value.is_empty() {
                    self.prompt_marker = value.to_string();
                }
            }
            _ => {}
        }
    }

    pub fn with_response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.response_timeout = timeout;
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn with_policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_prompt_marker(mut self, marker: impl Into<String>) -> Self {
        self.prompt_marker = marker.into();
        self
    }

    /// Build the strategy object this configuration selects
    pub fn build_policy(&self) -> Box<dyn DrainPolicy> {
        match self.policy {
            PolicyKind::DrainReady => Box::new(DrainReady::with_settle(self.settle)),
            PolicyKind::PromptMarker => Box::new(PromptMarker::new(self.prompt_marker.clone())),
        }
    }
}

const KEYS: [&str; 6] = [
    "SHELL_CONFORM_TIMEOUT_MS",
    "SHELL_CONFORM_STOP_GRACE_MS",
    "SHELL_CONFORM_POLL_MS",
    "SHELL_CONFORM_POLICY",
    "SHELL_CONFORM_SETTLE_MS",
    "SHELL_CONFORM_PROMPT",
];

/// Parse a shell variable assignment (KEY=value or KEY="value")
fn parse_assignment(line: &str) -> Option<(String, String)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim().to_string();
    let value = line[eq_pos + 1..].trim().to_string();

    if key.is_empty() || !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }

    Some((key, value))
}

/// Remove surrounding quotes from a value
fn unquote(s: &str) -> String {
    let s = s.trim();

    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        return s[1..s.len() - 1].to_string();
    }

    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        let config = HarnessConfig::parse("");
        assert_eq!(config.response_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.policy, PolicyKind::DrainReady);
        assert_eq!(config.prompt_marker, "$ ");
    }

    #[test]
    fn test_parse_full() {
        let content = r#"
# harness settings
SHELL_CONFORM_TIMEOUT_MS=1500
export SHELL_CONFORM_STOP_GRACE_MS=300
SHELL_CONFORM_POLICY="prompt"
SHELL_CONFORM_PROMPT='> '
SHELL_CONFORM_SETTLE_MS=20
"#;
        let config = HarnessConfig::parse(content);

        assert_eq!(config.response_timeout, Some(Duration::from_millis(1500)));
        assert_eq!(config.stop_grace, Duration::from_millis(300));
        assert_eq!(config.policy, PolicyKind::PromptMarker);
        assert_eq!(config.prompt_marker, "> ");
        assert_eq!(config.settle, Duration::from_millis(20));
    }

    #[test]
    fn test_zero_timeout_waits_forever() {
        let config = HarnessConfig::parse("SHELL_CONFORM_TIMEOUT_MS=0");
        assert_eq!(config.response_timeout, None);
    }

    #[test]
    fn test_bad_values_are_ignored() {
        let content = "SHELL_CONFORM_TIMEOUT_MS=soon\nSHELL_CONFORM_POLICY=psychic\nNOT A KEY=1";
        let config = HarnessConfig::parse(content);
        assert_eq!(config.response_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.policy, PolicyKind::DrainReady);
    }

    #[test]
    fn test_policy_kind_from_str() {
        assert_eq!(PolicyKind::from_str("DRAIN"), Some(PolicyKind::DrainReady));
        assert_eq!(PolicyKind::from_str("prompt-marker"), Some(PolicyKind::PromptMarker));
        assert_eq!(PolicyKind::from_str("lines"), None);
    }

    #[test]
    fn test_builders() {
        let config = HarnessConfig::default()
            .with_response_timeout(None)
            .with_policy(PolicyKind::PromptMarker)
            .with_prompt_marker("% ");
        assert_eq!(config.response_timeout, None);
        assert_eq!(config.policy, PolicyKind::PromptMarker);
        assert_eq!(config.prompt_marker, "% ");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"hello\""), "hello");
        assert_eq!(unquote("'hello'"), "hello");
        assert_eq!(unquote("hello"), "hello");
        assert_eq!(unquote("\""), "\"");
    }
}
