//! Built-in smoke cases
//!
//! End-to-end checks that any POSIX-flavoured interactive shell should pass.
//! They double as a check that the harness itself synchronizes correctly
//! against a given target.

use crate::config::HarnessConfig;
use crate::harness::ShellHarness;
use crate::runner::Suite;
use crate::sandbox::Sandbox;
use anyhow::{ensure, Context, Result};
use std::path::Path;
use std::time::Duration;

/// The default suite run by the `shell-conform` binary
pub fn builtin_suite() -> Suite {
    Suite::new()
        .case("invalid_command", invalid_command)
        .case("start_directory", start_directory)
        .case("home_navigation", home_navigation)
        .case("quiet_then_output", quiet_then_output)
        .case("exit_terminates", exit_terminates)
}

fn harness(executable: &Path) -> ShellHarness {
    ShellHarness::new(executable, HarnessConfig::from_env())
}

fn invalid_command(executable: &Path) -> Result<()> {
    let mut shell = harness(executable);
    shell.start_plain()?;

    let output = shell.run("invalid_command")?;
    ensure!(
        output.contains("command not found"),
        "Expected \"command not found\" but got {:?}",
        output.lines()
    );
    Ok(())
}

fn start_directory(executable: &Path) -> Result<()> {
    let expected = std::path::absolute(executable)
        .with_context(|| format!("resolving {}", executable.display()))?;
    let expected = expected
        .parent()
        .context("executable has no parent directory")?
        .to_path_buf();

    let mut shell = harness(executable);
    shell.start_plain()?;

    let output = shell.run("pwd")?;
    let reported = output.trimmed().unwrap_or_default();
    ensure!(
        Path::new(reported) == expected,
        "Expected \"{}\" but got \"{}\"",
        expected.display(),
        reported
    );
    Ok(())
}

fn home_navigation(executable: &Path) -> Result<()> {
    let mut sandbox = Sandbox::create()?;
    let home = sandbox.overlay_home("home")?;
    let elsewhere = sandbox.ensure_dir("elsewhere")?;

    let mut shell = harness(executable);
    shell.start(sandbox.env())?;

    shell.execute_quiet(&format!("cd {}", elsewhere.display()))?;
    let output = shell.run("pwd")?;
    ensure!(
        output.trimmed() == Some(&*elsewhere.to_string_lossy()),
        "Expected \"{}\" but got {:?}",
        elsewhere.display(),
        output.lines()
    );

    shell.execute_quiet("cd ~")?;
    let output = shell.run("pwd")?;
    ensure!(
        output.trimmed() == Some(&*home.to_string_lossy()),
        "Expected \"{}\" but got {:?}",
        home.display(),
        output.lines()
    );
    Ok(())
}

fn quiet_then_output(executable: &Path) -> Result<()> {
    let mut shell = harness(executable);
    shell.start_plain()?;

    shell.execute_quiet("cd .")?;
    let output = shell.run("echo burst-boundary")?;
    ensure!(
        output.lines() == ["burst-boundary\n"],
        "Expected only [\"burst-boundary\\n\"] but got {:?}",
        output.lines()
    );
    Ok(())
}

fn exit_terminates(executable: &Path) -> Result<()> {
    let mut shell = harness(executable);
    shell.start_plain()?;

    shell.execute_quiet("exit 0")?;
    ensure!(
        shell.wait_for_exit(Duration::from_secs(2)),
        "Process did not exit after executing the exit command"
    );
    ensure!(!shell.is_alive(), "Process is still alive after exit command");
    shell.stop();
    Ok(())
}
