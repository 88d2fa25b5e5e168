// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::path::Path;
use std::process::{Command, ExitCode};

const LANES: &[(&str, &[&str])] = &[
    ("fmt", &["cargo fmt --all -- --check"]),
    (
        "lint",
        &["cargo clippy --workspace --all-targets -- -D warnings"],
    ),
    ("test", &["cargo test --workspace"]),
    ("bench", &["cargo bench -p keyhold-core --bench classifier_scan"]),
    (
        "ci",
        &[
            "cargo fmt --all -- --check",
            "cargo clippy --workspace --all-targets -- -D warnings",
            "cargo test --workspace",
        ],
    ),
];

fn run(root: &Path, cmd: &str) -> Result<(), String> {
    eprintln!("xtask: {cmd}");
    let status = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .current_dir(root)
        .status()
        .map_err(|e| format!("failed to run `{cmd}`: {e}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("command failed: {cmd}"))
    }
}

fn print_help() {
    eprintln!("xtask commands:");
    for (name, cmds) in LANES {
        eprintln!("  {name:<6} {}", cmds.join(" && "));
    }
}

fn main() -> ExitCode {
    let arg = env::args().nth(1).unwrap_or_else(|| "help".to_string());
    let Some(root) = Path::new(env!("CARGO_MANIFEST_DIR")).parent() else {
        eprintln!("xtask must live one level below the workspace root");
        return ExitCode::FAILURE;
    };

    let result = match arg.as_str() {
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        name => match LANES.iter().find(|(lane, _)| *lane == name) {
            Some((_, cmds)) => cmds.iter().try_for_each(|cmd| run(root, cmd)),
            None => Err(format!(
                "unknown xtask command: {name} (try `cargo run -p xtask -- help`)"
            )),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
