// Copyright (c) tdb contributors.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! A minimal embedding binary: wires `tracing-subscriber` and an empty rule
//! registry together and runs the CLI. Real embedders provide their own
//! `RuleRegistry` of declared rules. This binary exists to give the crate a
//! runnable smoke-test surface, not as the intended way to use `tdb`.

use std::sync::Arc;

use tdb::cli;
use tdb::logger::LevelFilteredLogger;
use tdb::logger::TracingLogger;
use tdb::logger::Verbosity;
use tdb::Coordinator;
use tdb::CoordinatorConfig;
use tdb::RuleRegistry;

#[tokio::main]
async fn main() {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let verbosity = cli::scan_verbosity(&argv).unwrap_or(Verbosity::INFO);

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let logger = Arc::new(LevelFilteredLogger::new(Arc::new(TracingLogger), verbosity));
    let config = CoordinatorConfig::new(RuleRegistry::new(Vec::new())).with_logger(logger);
    let coordinator = Coordinator::new(config);

    let code = cli::process_command_line(&coordinator, &argv).await;
    std::process::exit(code);
}
