// Copyright (c) tdb contributors.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Error & trace propagation (§4.6, §7).
//!
//! Every failure that leaves the engine is a single typed [`BuildError`]
//! carrying the build rule trace, the chain of target names from the
//! initiating request down to the failure. There's no structural "does this
//! look like a traced error" probe the way a dynamically-typed
//! implementation might need: the type itself is the marker.

use std::fmt;
use std::sync::Arc;

use crate::target::TargetName;

/// The taxonomy from §7, one variant per kind.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BuildErrorKind {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no rule for `{0}` and no such file or directory")]
    MissingTarget(TargetName),

    #[error("command-rewriting error: {0}")]
    CommandRewrite(String),

    #[error("command execution failed: {0}")]
    CommandExecution(String),

    #[error("`{target}` was expected to be a {expected} after the build but is not")]
    ArtifactShape { target: TargetName, expected: &'static str },

    #[error("build callable failed: {0}")]
    Callable(#[source] Arc<anyhow::Error>),

    #[error("filesystem error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    #[error("cycle detected: `{0}` depends on itself transitively")]
    Cycle(TargetName),
}

/// A [`BuildErrorKind`] plus the trace of targets leading to the failure.
///
/// `Clone` is required so this can be the `Error` type of a
/// `futures::future::Shared` future in the Coordinator's memo table (§4.2):
/// every caller sharing an in-flight build needs its own copy of the
/// eventual result. The non-`Clone` sources (`anyhow::Error`,
/// `std::io::Error`) are behind `Arc` so cloning the outer error is O(1).
#[derive(Debug, Clone)]
pub struct BuildError {
    pub kind: BuildErrorKind,
    pub trace: Vec<TargetName>,
}

impl BuildError {
    pub fn new(kind: BuildErrorKind, trace: Vec<TargetName>) -> Self {
        Self { kind, trace }
    }

    pub fn configuration(msg: impl Into<String>, trace: Vec<TargetName>) -> Self {
        Self::new(BuildErrorKind::Configuration(msg.into()), trace)
    }

    pub fn missing_target(target: TargetName, trace: Vec<TargetName>) -> Self {
        Self::new(BuildErrorKind::MissingTarget(target), trace)
    }

    pub fn command_rewrite(msg: impl Into<String>, trace: Vec<TargetName>) -> Self {
        Self::new(BuildErrorKind::CommandRewrite(msg.into()), trace)
    }

    pub fn callable(err: anyhow::Error, trace: Vec<TargetName>) -> Self {
        Self::new(BuildErrorKind::Callable(Arc::new(err)), trace)
    }

    pub fn io(err: std::io::Error, trace: Vec<TargetName>) -> Self {
        Self::new(BuildErrorKind::Io(Arc::new(err)), trace)
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.trace.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.trace.join(" -> "), self.kind)
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

pub type BuildResultOf<T> = Result<T, BuildError>;
