use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shell_conform::{HarnessConfig, ShellHarness};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

const ECHO_REPL: &str = "#!/bin/sh\nwhile IFS= read -r line; do\n    case $line in\n        quiet) ;;\n        *) echo \"$line\" ;;\n    esac\ndone\n";

fn echo_repl(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("echo-repl.sh");
    fs::write(&path, ECHO_REPL).expect("Failed to write bench fixture");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("Failed to chmod bench fixture");
    path
}

/// Latency of one execute() against a trivial echo loop
/// Target: well under 1ms per round trip
fn bench_execute(c: &mut Criterion) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let repl = echo_repl(&dir);

    let mut group = c.benchmark_group("execute");
    group.measurement_time(Duration::from_secs(5));

    let mut shell = ShellHarness::new(&repl, HarnessConfig::default());
    shell.start_plain().expect("Failed to start echo repl");

    group.bench_function("drain_ready_round_trip", |b| {
        b.iter(|| {
            let response = shell.run(black_box("ping")).expect("no response");
            black_box(response);
        });
    });

    group.bench_function("suppressed_send", |b| {
        b.iter(|| {
            shell.execute_quiet(black_box("quiet")).expect("send failed");
        });
    });

    group.finish();
}

/// Cost of spawning and tearing down a child per test
fn bench_lifecycle(c: &mut Criterion) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let repl = echo_repl(&dir);

    let mut group = c.benchmark_group("lifecycle");
    group.sample_size(30);

    group.bench_function("start_stop", |b| {
        b.iter(|| {
            let mut shell = ShellHarness::new(&repl, HarnessConfig::default());
            shell.start_plain().expect("Failed to start echo repl");
            shell.stop();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_execute, bench_lifecycle);
criterion_main!(benches);
