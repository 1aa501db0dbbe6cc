// Copyright (c) tdb contributors.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The declarative [`Rule`] type (§3) and the higher-order value types it's
//! built from.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::BuildContext;
use crate::target::TargetName;
use crate::target::TargetType;

/// A boxed, `'static`, `Send` future. The shape every async value crossing
/// a `dyn Fn` boundary in this crate takes, since trait objects can't
/// directly return `impl Future`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The effective build step for one target: run it and report success or
/// failure. Used both for user-supplied inline callables and for the
/// command callable the Rule Executor synthesizes from a command vector.
pub type BuildCallable = Arc<dyn Fn(BuildContext) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A user-supplied decorator around the effective callable (mutexes, timing,
/// tracing spans, per §9's "Transformer hook").
pub type Transformer = Arc<dyn Fn(BuildCallable) -> BuildCallable + Send + Sync>;

/// A hook that lazily produces the "generated rules" map (§4.1).
pub type GeneratedRulesHook =
    Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<Vec<(TargetName, Arc<Rule>)>>> + Send + Sync>;

/// The rule's prerequisite list: either known up front, or produced lazily
/// (e.g. by globbing a directory at resolve time).
#[derive(Clone)]
pub enum Prereqs {
    Eager(Vec<TargetName>),
    Lazy(Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<Vec<TargetName>>> + Send + Sync>),
}

impl Prereqs {
    pub fn none() -> Self {
        Prereqs::Eager(Vec::new())
    }

    pub async fn materialize(&self) -> anyhow::Result<Vec<TargetName>> {
        match self {
            Prereqs::Eager(v) => Ok(v.clone()),
            Prereqs::Lazy(f) => f().await,
        }
    }
}

impl From<Vec<TargetName>> for Prereqs {
    fn from(v: Vec<TargetName>) -> Self {
        Prereqs::Eager(v)
    }
}

impl<const N: usize> From<[&str; N]> for Prereqs {
    fn from(v: [&str; N]) -> Self {
        Prereqs::Eager(v.into_iter().map(str::to_owned).collect())
    }
}

/// The declarative spec for building one target (§3).
#[derive(Clone)]
pub struct Rule {
    pub description: Option<String>,
    pub prereqs: Prereqs,
    /// Inline build callable. Mutually exclusive with `cmd`: both present
    /// is a configuration error raised at rule-resolution time, not at
    /// construction, so `Rule` itself allows the illegal state to be
    /// represented (matching §4.4's "hard error... wrapped with trace").
    pub invoke: Option<BuildCallable>,
    /// External command argument vector, subject to `tdb:`-directive
    /// rewriting (§6) before spawn.
    pub cmd: Option<Vec<String>>,
    pub transformer: Option<Transformer>,
    pub target_type: TargetType,
    /// `None` means "use the default policy" (§3): delete iff `file`.
    pub keep_on_failure: Option<bool>,
}

impl Rule {
    pub fn new() -> Self {
        Self {
            description: None,
            prereqs: Prereqs::none(),
            invoke: None,
            cmd: None,
            transformer: None,
            target_type: TargetType::Auto,
            keep_on_failure: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_prereqs(mut self, prereqs: impl Into<Prereqs>) -> Self {
        self.prereqs = prereqs.into();
        self
    }

    pub fn with_invoke(mut self, f: BuildCallable) -> Self {
        self.invoke = Some(f);
        self
    }

    pub fn with_cmd(mut self, cmd: Vec<impl Into<String>>) -> Self {
        self.cmd = Some(cmd.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_transformer(mut self, t: Transformer) -> Self {
        self.transformer = Some(t);
        self
    }

    pub fn with_target_type(mut self, t: TargetType) -> Self {
        self.target_type = t;
        self
    }

    pub fn with_keep_on_failure(mut self, keep: bool) -> Self {
        self.keep_on_failure = Some(keep);
        self
    }

    /// Resolves the failure-file policy: explicit override, else the
    /// type-driven default (§3, §4.3).
    pub fn keep_on_failure(&self) -> bool {
        self.keep_on_failure
            .unwrap_or_else(|| self.target_type.default_keep_on_failure())
    }
}

impl Default for Rule {
    fn default() -> Self {
        Self::new()
    }
}
