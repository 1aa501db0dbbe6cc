// Copyright (c) tdb contributors.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! [`CoordinatorConfig`] (§6): the single value threaded through
//! `Coordinator::new`, aggregating everything the library-facing API says a
//! Coordinator is constructed with.

use std::sync::Arc;

use crate::logger::Logger;
use crate::logger::TracingLogger;
use crate::registry::RuleRegistry;
use crate::target::TargetName;

/// Whether sibling prerequisite builds run concurrently or strictly in
/// declaration order (§5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyMode {
    Serial,
    Parallel,
}

impl ConcurrencyMode {
    /// The `--serial`/`--parallel` CLI override rule (§5, §6): a Coordinator
    /// configured serial refuses to be downgraded to parallel; the reverse
    /// is always honored.
    pub fn apply_override(self, requested: ConcurrencyMode) -> ConcurrencyMode {
        match (self, requested) {
            (ConcurrencyMode::Serial, ConcurrencyMode::Parallel) => ConcurrencyMode::Serial,
            (_, requested) => requested,
        }
    }
}

pub struct CoordinatorConfig {
    pub registry: RuleRegistry,
    pub logger: Arc<dyn Logger>,
    pub global_prereqs: Vec<TargetName>,
    pub default_targets: Vec<TargetName>,
    pub mode: ConcurrencyMode,
    pub script_name: String,
}

impl CoordinatorConfig {
    pub fn new(registry: RuleRegistry) -> Self {
        Self {
            registry,
            logger: Arc::new(TracingLogger),
            global_prereqs: Vec::new(),
            default_targets: Vec::new(),
            mode: ConcurrencyMode::Parallel,
            script_name: "tdb".to_owned(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_global_prereqs(mut self, prereqs: Vec<TargetName>) -> Self {
        self.global_prereqs = prereqs;
        self
    }

    pub fn with_default_targets(mut self, targets: Vec<TargetName>) -> Self {
        self.default_targets = targets;
        self
    }

    pub fn with_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_script_name(mut self, name: impl Into<String>) -> Self {
        self.script_name = name.into();
        self
    }
}
