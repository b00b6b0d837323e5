// Shared fixture for integration tests: a tiny line-oriented REPL written
// in POSIX sh, standing in for a real shell under test.

#![allow(dead_code)]

use shell_conform::HarnessConfig;
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

const FIXTURE_REPL: &str = r#"#!/bin/sh
# Reads one command per line and answers on stdout/stderr.
set -f
prompt() {
    if [ -n "$FIXTURE_PROMPT" ]; then printf '%s' "$FIXTURE_PROMPT"; fi
}
prompt
while IFS= read -r line; do
    set -- $line
    cmd=${1:-}
    if [ $# -gt 0 ]; then shift; fi
    case $cmd in
        '') ;;
        echo) echo "$*" ;;
        pwd) pwd ;;
        argv0) echo "${0##*/}" ;;
        cd)
            target=${1:-$HOME}
            case $target in
                '~') target=$HOME ;;
                '~/'*) target=$HOME/${target#'~/'} ;;
            esac
            cd "$target" 2>/dev/null || echo "cd: $target: No such file or directory"
            ;;
        lines)
            i=1
            while [ "$i" -le "$1" ]; do echo "line $i"; i=$((i + 1)); done
            ;;
        late) echo early; sleep "$1"; echo late ;;
        framed) echo alpha; echo beta; echo END ;;
        err) echo "$*" >&2 ;;
        getenv) eval "echo \"\${$1}\"" ;;
        silent) ;;
        exit) exit "${1:-0}" ;;
        *) echo "$cmd: command not found" ;;
    esac
    prompt
done
"#;

/// Path to the fixture REPL, written once per test binary
pub fn fixture_repl() -> &'static Path {
    static FIXTURE: OnceLock<PathBuf> = OnceLock::new();
    FIXTURE.get_or_init(|| {
        let dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("fixture-repl");
        fs::create_dir_all(&dir).unwrap();

        // write-then-rename so no process ever execs a half-written file
        let mut staged = tempfile::NamedTempFile::new_in(&dir).unwrap();
        staged.write_all(FIXTURE_REPL.as_bytes()).unwrap();
        staged
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o755))
            .unwrap();
        let path = dir.join("repl.sh");
        drop(staged.persist(&path).unwrap());
        path
    })
}

/// Config with short budgets so a broken test fails fast
pub fn test_config() -> HarnessConfig {
    HarnessConfig::default()
        .with_response_timeout(Some(Duration::from_secs(5)))
        .with_stop_grace(Duration::from_millis(500))
}
