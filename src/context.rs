// Copyright (c) tdb contributors.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! [`BuildResult`] and [`BuildContext`] (§3).

use std::sync::Arc;

use crate::coordinator::Coordinator;
use crate::logger::Logger;
use crate::target::TargetName;

/// The single output of any successful build.
///
/// `mtime` uses `f64::NEG_INFINITY`/`f64::INFINITY` for the spec's `-∞`/`+∞`
/// sentinels, so every comparison the spec describes (`>`, "strictly
/// greater") is ordinary float comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildResult {
    pub mtime: f64,
}

impl BuildResult {
    pub const NEVER_BUILT: BuildResult = BuildResult { mtime: f64::NEG_INFINITY };
    pub const PHONY: BuildResult = BuildResult { mtime: f64::INFINITY };

    pub fn new(mtime: f64) -> Self {
        Self { mtime }
    }
}

/// Passed to every rule invocation: the inline callable, the command
/// callable produced by the Rule Executor, and the wrapper transformer all
/// receive one of these.
#[derive(Clone)]
pub struct BuildContext {
    /// The target currently being built.
    pub target: TargetName,
    /// The build rule trace: root request down to (and including) `target`.
    pub trace: Vec<TargetName>,
    /// Materialized prerequisite names, in the order the callable should see
    /// them (explicit prereqs first, then globals).
    pub prereqs: Vec<TargetName>,
    pub logger: Arc<dyn Logger>,
    /// Back-reference so rules can request additional builds dynamically
    /// (§9 "Back-reference in context"). An `Arc` clone is cheap and the
    /// context never outlives the coordinator that created it, so this
    /// isn't a reference cycle in practice even though it's an owning
    /// handle.
    pub coordinator: Arc<Coordinator>,
}

impl BuildContext {
    /// Convenience for rule authors: request another target be built,
    /// continuing the same trace.
    pub async fn build(&self, name: impl Into<TargetName>) -> Result<BuildResult, crate::error::BuildError> {
        self.coordinator.build(name.into(), self.trace.clone()).await
    }
}
