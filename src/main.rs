use anyhow::{bail, Context, Result};
use shell_conform::cases::builtin_suite;
use shell_conform::config::{HarnessConfig, PolicyKind};
use shell_conform::logging;
use shell_conform::signal::SignalHandler;
use std::env;
use std::path::PathBuf;

const USAGE: &str = "Usage: shell-conform <shell_executable> [--json] [--verbose] [--filter <substr>] [--config <file>] [--list]";

#[derive(Debug, Default)]
struct Options {
    executable: Option<PathBuf>,
    json: bool,
    verbose: bool,
    list: bool,
    help: bool,
    filter: Option<String>,
    config: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut opts = Options::default();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--json" => opts.json = true,
            "--verbose" | "-v" => opts.verbose = true,
            "--list" => opts.list = true,
            "--filter" if i + 1 < args.len() => {
                opts.filter = Some(args[i + 1].clone());
                i += 1;
            }
            "--config" if i + 1 < args.len() => {
                opts.config = Some(PathBuf::from(&args[i + 1]));
                i += 1;
            }
            "--help" | "-h" => opts.help = true,
            flag if flag.starts_with('-') => bail!("unknown or incomplete option: {}", flag),
            path => {
                if opts.executable.is_some() {
                    bail!("unexpected argument: {}", path);
                }
                opts.executable = Some(PathBuf::from(path));
            }
        }
        i += 1;
    }
    Ok(opts)
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let opts = match parse_args(&args) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("shell-conform: {}", e);
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    if opts.help {
        println!("{}", USAGE);
        return Ok(());
    }

    logging::init(opts.verbose);

    let suite = builtin_suite();
    if opts.list {
        for name in suite.names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let Some(executable) = opts.executable else {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    };

    // Cases build their harness from the environment; a config file is
    // exported there so every case sees the same settings.
    if let Some(path) = &opts.config {
        let config = HarnessConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        export_config(&config);
    }

    let signals = SignalHandler::new();
    signals.setup().context("installing signal handlers")?;

    let report = suite.run(&executable, opts.filter.as_deref(), || signals.should_shutdown());

    if opts.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report);
    }

    let code = if signals.should_shutdown() {
        signals.exit_code()
    } else {
        report.exit_code()
    };
    std::process::exit(code);
}

fn export_config(config: &HarnessConfig) {
    let timeout_ms = config
        .response_timeout
        .map(|t| t.as_millis().max(1))
        .unwrap_or(0);
    let policy = match config.policy {
        PolicyKind::DrainReady => "drain",
        PolicyKind::PromptMarker => "prompt",
    };

    env::set_var("SHELL_CONFORM_TIMEOUT_MS", timeout_ms.to_string());
    env::set_var("SHELL_CONFORM_STOP_GRACE_MS", config.stop_grace.as_millis().to_string());
    env::set_var("SHELL_CONFORM_POLL_MS", config.poll_interval.as_millis().to_string());
    env::set_var("SHELL_CONFORM_POLICY", policy);
    env::set_var("SHELL_CONFORM_SETTLE_MS", config.settle.as_millis().to_string());
    env::set_var("SHELL_CONFORM_PROMPT", &config.prompt_marker);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("shell-conform")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_parse_args() {
        let opts = parse_args(&args(&["./shell", "--json", "--filter", "home"])).unwrap();
        assert_eq!(opts.executable, Some(PathBuf::from("./shell")));
        assert!(opts.json);
        assert_eq!(opts.filter.as_deref(), Some("home"));
        assert!(!opts.list);
    }

    #[test]
    fn test_parse_args_help() {
        let opts = parse_args(&args(&["--help"])).unwrap();
        assert!(opts.help);
        assert_eq!(opts.executable, None);

        let opts = parse_args(&args(&["./shell", "-h"])).unwrap();
        assert!(opts.help);
    }

    #[test]
    fn test_parse_args_rejects_unknown() {
        assert!(parse_args(&args(&["--frobnicate"])).is_err());
        assert!(parse_args(&args(&["a", "b"])).is_err());
        assert!(parse_args(&args(&["--filter"])).is_err());
    }
}
