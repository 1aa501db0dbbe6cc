// Copyright (c) tdb contributors.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The Build Coordinator (§4.2): the memoized public entrypoint. For any
//! target name, produces at most one in-flight build future; composes
//! results across `buildAll`.

use std::collections::HashMap;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use futures::future::FutureExt;
use futures::future::Shared;

use crate::config::ConcurrencyMode;
use crate::config::CoordinatorConfig;
use crate::context::BuildResult;
use crate::error::BuildError;
use crate::freshness::FsOracle;
use crate::freshness::MtimeOracle;
use crate::freshness::NotFoundPolicy;
use crate::logger::Logger;
use crate::registry::RuleRegistry;
use crate::resolver;
use crate::rule::BoxFuture;
use crate::target::dedup_preserve_order;
use crate::target::TargetName;

type MemoFuture = Shared<BoxFuture<'static, Result<BuildResult, BuildError>>>;

/// The engine's single shared entrypoint. Always lives behind an `Arc`: both
/// `BuildContext` (so rule callables can request further builds) and
/// recursive resolver calls need to clone a handle to it.
pub struct Coordinator {
    registry: RuleRegistry,
    logger: Arc<dyn Logger>,
    global_prereqs: Vec<TargetName>,
    default_targets: Vec<TargetName>,
    script_name: String,
    base_mode: ConcurrencyMode,
    current_mode: AtomicU8,
    oracle: Box<dyn MtimeOracle>,
    memo: Mutex<HashMap<TargetName, MemoFuture>>,
}

fn mode_to_u8(mode: ConcurrencyMode) -> u8 {
    match mode {
        ConcurrencyMode::Serial => 0,
        ConcurrencyMode::Parallel => 1,
    }
}

fn mode_from_u8(v: u8) -> ConcurrencyMode {
    match v {
        0 => ConcurrencyMode::Serial,
        _ => ConcurrencyMode::Parallel,
    }
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Arc<Self> {
        Self::with_oracle(config, Box::new(FsOracle))
    }

    /// Construction with an explicit oracle. The seam tests use to swap in
    /// a `LayeredOracle` with a sidecar-timestamp alternate (§4.5, §8).
    pub fn with_oracle(config: CoordinatorConfig, oracle: Box<dyn MtimeOracle>) -> Arc<Self> {
        Arc::new(Self {
            registry: config.registry,
            logger: config.logger,
            global_prereqs: config.global_prereqs,
            default_targets: config.default_targets,
            script_name: config.script_name,
            base_mode: config.mode,
            current_mode: AtomicU8::new(mode_to_u8(config.mode)),
            oracle,
            memo: Mutex::new(HashMap::new()),
        })
    }

    pub fn global_prereqs(&self) -> &[TargetName] {
        &self.global_prereqs
    }

    pub fn default_targets(&self) -> &[TargetName] {
        &self.default_targets
    }

    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn logger(&self) -> Arc<dyn Logger> {
        Arc::clone(&self.logger)
    }

    pub fn oracle(&self) -> &dyn MtimeOracle {
        self.oracle.as_ref()
    }

    pub fn mode(&self) -> ConcurrencyMode {
        mode_from_u8(self.current_mode.load(Ordering::Relaxed))
    }

    /// Applies the CLI's `--serial`/`--parallel` override against the
    /// configured base mode (§5's "serial refuses to be downgraded" rule),
    /// for the remainder of this Coordinator's lifetime. Intended to be
    /// called once, before any build is started.
    pub fn set_requested_mode(&self, requested: ConcurrencyMode) {
        let effective = self.base_mode.apply_override(requested);
        self.current_mode.store(mode_to_u8(effective), Ordering::Relaxed);
    }

    /// `build(name, {trace})` (§4.2, §6). Memoized: a second request for a
    /// target already in-flight shares the first future's eventual result.
    ///
    /// `trace` is the chain of ancestor targets that led to this request. If
    /// `name` is already among them, this is a cycle: recursing further
    /// would await a future that can only complete after this very call
    /// returns. That check has to happen here, before the memo lookup below,
    /// because a re-entrant request for an in-flight ancestor is exactly the
    /// case the memo table is built to short-circuit - without this guard it
    /// would hand back the ancestor's own pending `Shared` future and
    /// deadlock instead of erroring.
    pub async fn build(self: &Arc<Self>, name: TargetName, trace: Vec<TargetName>) -> Result<BuildResult, BuildError> {
        if trace.iter().any(|t| t == &name) {
            let mut trace_here = trace;
            trace_here.push(name.clone());
            return Err(BuildError::new(crate::error::BuildErrorKind::Cycle(name), trace_here));
        }

        let fut = {
            let mut memo = self.memo.lock().expect("memo table mutex poisoned");
            if let Some(existing) = memo.get(&name) {
                existing.clone()
            } else {
                let coordinator = Arc::clone(self);
                let name_for_task = name.clone();
                let task: BoxFuture<'static, Result<BuildResult, BuildError>> =
                    Box::pin(async move { coordinator.build_uncached(name_for_task, trace).await });
                let shared = task.shared();
                memo.insert(name, shared.clone());
                shared
            }
        };
        fut.await
    }

    async fn build_uncached(
        self: Arc<Self>,
        name: TargetName,
        trace: Vec<TargetName>,
    ) -> Result<BuildResult, BuildError> {
        let rule = self
            .registry
            .lookup(&name)
            .await
            .map_err(|e| BuildError::callable(e, trace.clone()))?;
        match rule {
            Some(rule) => resolver::resolve(&self, name, rule, trace).await,
            None => {
                let mtime = crate::freshness::effective_mtime(
                    self.oracle(),
                    &name,
                    NotFoundPolicy::Error,
                    f64::INFINITY,
                )
                .await
                .map_err(|e| BuildError::io(e, trace.clone()))?;
                match mtime {
                    Some(m) => Ok(BuildResult::new(m)),
                    None => Err(BuildError::missing_target(name, trace)),
                }
            }
        }
    }

    /// `buildAll(names, {trace})` (§4.2): dedupes preserving first-occurrence
    /// order, then fans out in `mode`, returning the elementwise max mtime.
    pub async fn build_all(
        self: &Arc<Self>,
        names: Vec<TargetName>,
        trace: Vec<TargetName>,
        mode: ConcurrencyMode,
    ) -> Result<BuildResult, BuildError> {
        let names = dedup_preserve_order(names);
        let mut max = BuildResult::NEVER_BUILT.mtime;
        match mode {
            ConcurrencyMode::Parallel => {
                let futs = names.into_iter().map(|name| {
                    let trace = trace.clone();
                    let this = Arc::clone(self);
                    async move { this.build(name, trace).await }
                });
                let results = futures::future::try_join_all(futs).await?;
                for r in results {
                    if r.mtime > max {
                        max = r.mtime;
                    }
                }
            }
            ConcurrencyMode::Serial => {
                for name in names {
                    let r = self.build(name, trace.clone()).await?;
                    if r.mtime > max {
                        max = r.mtime;
                    }
                }
            }
        }
        Ok(BuildResult::new(max))
    }

    /// Join/Shutdown (§4.7): await every build future currently in the memo
    /// table, then re-check whether new entries appeared while waiting (a
    /// rule may have dynamically requested another target), repeating until
    /// the table's size stabilizes.
    pub async fn join(self: &Arc<Self>) {
        loop {
            let snapshot: Vec<MemoFuture> = {
                let memo = self.memo.lock().expect("memo table mutex poisoned");
                memo.values().cloned().collect()
            };
            let before = snapshot.len();
            for fut in snapshot {
                let _ = fut.await;
            }
            let after = self.memo.lock().expect("memo table mutex poisoned").len();
            if after == before {
                break;
            }
        }
    }
}
