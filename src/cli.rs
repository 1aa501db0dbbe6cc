// Copyright (c) tdb contributors.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The command-line surface (§6). Hand-rolled rather than a `clap` derive:
//! the grammar's catch-all "anything else is a target name" rule, combined
//! with `-`-prefixed flags being order-independent and target names being
//! free-form strings that may themselves start with `tdb:`-like text, does
//! not map cleanly onto a declarative parser.

use std::sync::Arc;

use crate::config::ConcurrencyMode;
use crate::coordinator::Coordinator;
use crate::error::BuildError;
use crate::logger::Verbosity;
use crate::target::TargetName;

/// What the user asked the binary to do, decoded from argv.
#[derive(Debug, Clone)]
pub struct BuildParameters {
    pub action: Action,
    pub targets: Vec<TargetName>,
    pub verbosity: Option<Verbosity>,
    pub concurrency_override: Option<ConcurrencyMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Help,
    ListTargets,
    DescribeTargets,
    Build,
}

/// Normalizes a raw CLI argument into a target name: backslashes become
/// forward slashes, so paths survive shell tab-completion on Windows (§6).
fn normalize_target(raw: &str) -> TargetName {
    raw.replace('\\', "/")
}

/// A lightweight pre-pass for `main.rs`: the verbosity flag must be known
/// before a logger (and therefore a `Coordinator`) is constructed, so it is
/// scanned independently of the full [`parse_command_line_args`] pass.
pub fn scan_verbosity(argv: &[String]) -> Option<Verbosity> {
    let mut verbosity = None;
    for arg in argv {
        match arg.as_str() {
            "-v" => verbosity = Some(Verbosity::INFO),
            "-q" => verbosity = Some(Verbosity::ERRORS),
            other if other.starts_with("--verbosity=") => {
                if let Ok(n) = other["--verbosity=".len()..].parse() {
                    verbosity = Some(Verbosity(n));
                }
            }
            _ => {}
        }
    }
    verbosity
}

/// `parseCommandLineArgs(argv)` (§6).
pub fn parse_command_line_args(argv: &[String]) -> Result<BuildParameters, BuildError> {
    let mut action = Action::Build;
    let mut targets = Vec::new();
    let mut verbosity = None;
    let mut concurrency_override = None;

    for arg in argv {
        match arg.as_str() {
            "--help" => action = Action::Help,
            "--list-targets" => action = Action::ListTargets,
            "--describe-targets" => action = Action::DescribeTargets,
            "-v" => verbosity = Some(Verbosity::INFO),
            "-q" => verbosity = Some(Verbosity::ERRORS),
            "--serial" => concurrency_override = Some(ConcurrencyMode::Serial),
            "--parallel" => concurrency_override = Some(ConcurrencyMode::Parallel),
            other if other.starts_with("--verbosity=") => {
                let n: u32 = other["--verbosity=".len()..].parse().map_err(|_| {
                    BuildError::configuration(format!("invalid verbosity: `{other}`"), Vec::new())
                })?;
                verbosity = Some(Verbosity(n));
            }
            other if other.starts_with('-') => {
                return Err(BuildError::configuration(
                    format!("Unrecognized argument: `{other}`"),
                    Vec::new(),
                ));
            }
            other => targets.push(normalize_target(other)),
        }
    }

    Ok(BuildParameters { action, targets, verbosity, concurrency_override })
}

fn print_usage(script_name: &str) {
    println!("usage: {script_name} [options] [targets...]");
    println!();
    println!("options:");
    println!("  --help               print this message");
    println!("  --list-targets       print one known target name per line");
    println!("  --describe-targets   print each target name with its description");
    println!("  -v                   set verbosity to info");
    println!("  -q                   set verbosity to errors-only");
    println!("  --verbosity=<N>      set verbosity to an explicit numeric level");
    println!("  --serial             force serial prerequisite builds");
    println!("  --parallel           allow parallel prerequisite builds");
}

async fn print_list_targets(coordinator: &Arc<Coordinator>) -> Result<(), BuildError> {
    let rules = coordinator
        .registry()
        .enumerate()
        .await
        .map_err(|e| BuildError::callable(e, Vec::new()))?;
    for (name, _) in rules {
        println!("{name}");
    }
    Ok(())
}

async fn print_describe_targets(coordinator: &Arc<Coordinator>) -> Result<(), BuildError> {
    let rules = coordinator
        .registry()
        .enumerate()
        .await
        .map_err(|e| BuildError::callable(e, Vec::new()))?;
    let width = rules.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, rule) in rules {
        let description = rule.description.as_deref().unwrap_or("");
        let mut lines = description.lines();
        let first = lines.next().unwrap_or("");
        println!("{name:width$}  {first}");
        for line in lines {
            println!("{:width$}  {line}", "");
        }
    }
    if !coordinator.default_targets().is_empty() {
        println!("default targets: {}", coordinator.default_targets().join(" "));
    }
    Ok(())
}

/// `run(params)` (§6): executes the decoded command against `coordinator`.
pub async fn run(coordinator: &Arc<Coordinator>, params: BuildParameters) -> Result<(), BuildError> {
    match params.action {
        Action::Help => {
            print_usage(coordinator.script_name());
            return Ok(());
        }
        Action::ListTargets => return print_list_targets(coordinator).await,
        Action::DescribeTargets => return print_describe_targets(coordinator).await,
        Action::Build => {}
    }

    if let Some(mode) = params.concurrency_override {
        coordinator.set_requested_mode(mode);
    }

    let targets = if params.targets.is_empty() {
        if coordinator.default_targets().is_empty() {
            coordinator
                .logger()
                .warn("no targets given and no default targets configured; nothing to do");
            return Ok(());
        }
        coordinator.default_targets().to_vec()
    } else {
        params.targets
    };

    let result = coordinator.build_all(targets, Vec::new(), coordinator.mode()).await;
    coordinator.join().await;
    result.map(|_| ())
}

/// `processCommandLine(argv)` (§6): the full decode-dispatch-report cycle,
/// returning the process exit code (0 success, 1 failure).
pub async fn process_command_line(coordinator: &Arc<Coordinator>, argv: &[String]) -> i32 {
    let params = match parse_command_line_args(argv) {
        Ok(p) => p,
        Err(e) => {
            coordinator.logger().error(&format!("{e}"));
            return 1;
        }
    };
    // Verbosity only affects filtering by a `LevelFilteredLogger` the
    // embedder wires into `CoordinatorConfig` before construction; by the
    // time `params` reaches here there's nothing left for it to configure.
    // `scan_verbosity` below does the early pass for `main.rs`.
    match run(coordinator, params).await {
        Ok(()) => 0,
        Err(e) => {
            coordinator.logger().error(&format!("{e}"));
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn plain_arguments_become_targets() {
        let params = parse_command_line_args(&argv(&["foo", "bar/baz"])).unwrap();
        assert_eq!(params.action, Action::Build);
        assert_eq!(params.targets, vec!["foo".to_string(), "bar/baz".to_string()]);
    }

    #[test]
    fn backslashes_are_normalized() {
        let params = parse_command_line_args(&argv(&["out\\sub\\file.o"])).unwrap();
        assert_eq!(params.targets, vec!["out/sub/file.o".to_string()]);
    }

    #[test]
    fn help_flag_sets_action() {
        let params = parse_command_line_args(&argv(&["--help"])).unwrap();
        assert_eq!(params.action, Action::Help);
    }

    #[test]
    fn verbosity_flags() {
        assert_eq!(
            parse_command_line_args(&argv(&["-v"])).unwrap().verbosity,
            Some(Verbosity::INFO)
        );
        assert_eq!(
            parse_command_line_args(&argv(&["-q"])).unwrap().verbosity,
            Some(Verbosity::ERRORS)
        );
        assert_eq!(
            parse_command_line_args(&argv(&["--verbosity=300"])).unwrap().verbosity,
            Some(Verbosity(300))
        );
    }

    #[test]
    fn unrecognized_flag_is_rejected() {
        let err = parse_command_line_args(&argv(&["--nope"])).unwrap_err();
        assert!(matches!(err.kind, crate::error::BuildErrorKind::Configuration(_)));
    }

    #[test]
    fn concurrency_flags() {
        let params = parse_command_line_args(&argv(&["--serial"])).unwrap();
        assert_eq!(params.concurrency_override, Some(ConcurrencyMode::Serial));
        let params = parse_command_line_args(&argv(&["--parallel"])).unwrap();
        assert_eq!(params.concurrency_override, Some(ConcurrencyMode::Parallel));
    }
}
