// Copyright (c) tdb contributors.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The logger interface (§6, peripheral plumbing whose interface only is
//! specified here). Default implementation forwards onto `tracing`, so a
//! binary wiring `tracing-subscriber` gets structured, leveled output with
//! no extra effort; the `Logger` trait remains the pluggable seam for
//! embedders who want their own sink.

use std::sync::Arc;

/// Three sinks, matching §6 exactly. Rust's `format!`/`Display` already
/// cover "a primary message plus variadic context": there's no separate
/// varargs mechanism to model on top of that.
pub trait Logger: Send + Sync {
    fn error(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn log(&self, msg: &str);
}

/// Numeric verbosity thresholds (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Verbosity(pub u32);

impl Verbosity {
    pub const SILENT: Verbosity = Verbosity(0);
    pub const ERRORS: Verbosity = Verbosity(50);
    pub const WARNINGS: Verbosity = Verbosity(100);
    pub const INFO: Verbosity = Verbosity(200);
    pub const DEBUG: Verbosity = Verbosity(300);
}

/// Forwards to `tracing`'s levelled macros.
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    fn log(&self, msg: &str) {
        tracing::info!("{msg}");
    }
}

/// Discards everything.
pub struct NullLogger;

impl Logger for NullLogger {
    fn error(&self, _msg: &str) {}
    fn warn(&self, _msg: &str) {}
    fn log(&self, _msg: &str) {}
}

/// Discards messages below `threshold`. `log()` is treated as `INFO`-level
/// for filtering purposes (there's no separate debug sink in §6's
/// three-method interface).
pub struct LevelFilteredLogger {
    inner: Arc<dyn Logger>,
    threshold: Verbosity,
}

impl LevelFilteredLogger {
    pub fn new(inner: Arc<dyn Logger>, threshold: Verbosity) -> Self {
        Self { inner, threshold }
    }
}

impl Logger for LevelFilteredLogger {
    fn error(&self, msg: &str) {
        if self.threshold >= Verbosity::ERRORS {
            self.inner.error(msg);
        }
    }

    fn warn(&self, msg: &str) {
        if self.threshold >= Verbosity::WARNINGS {
            self.inner.warn(msg);
        }
    }

    fn log(&self, msg: &str) {
        if self.threshold >= Verbosity::INFO {
            self.inner.log(msg);
        }
    }
}

/// Prepends a constant prefix to every message.
pub struct PrefixedLogger {
    inner: Arc<dyn Logger>,
    prefix: String,
}

impl PrefixedLogger {
    pub fn new(inner: Arc<dyn Logger>, prefix: impl Into<String>) -> Self {
        Self { inner, prefix: prefix.into() }
    }
}

impl Logger for PrefixedLogger {
    fn error(&self, msg: &str) {
        self.inner.error(&format!("{}{}", self.prefix, msg));
    }

    fn warn(&self, msg: &str) {
        self.inner.warn(&format!("{}{}", self.prefix, msg));
    }

    fn log(&self, msg: &str) {
        self.inner.log(&format!("{}{}", self.prefix, msg));
    }
}
