// Copyright (c) tdb contributors.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The Target Resolver (§4.3): for a single rule, gather prerequisites,
//! recurse, compare mtimes, decide run-or-skip, and verify/post-process a
//! successful build.

use std::fmt;
use std::sync::Arc;

use crate::context::BuildContext;
use crate::coordinator::Coordinator;
use crate::error::BuildError;
use crate::error::BuildErrorKind;
use crate::executor;
use crate::freshness;
use crate::freshness::NotFoundPolicy;
use crate::fsutil;
use crate::rule::BuildCallable;
use crate::rule::Rule;
use crate::target::dedup_preserve_order;
use crate::target::TargetName;
use crate::target::TargetType;
use crate::context::BuildResult;

/// Marks a verification failure so it can be distinguished, via
/// `anyhow::Error::downcast_ref`, from an ordinary user-callable failure once
/// it reaches the resolver's catch site, the only place that needs to tell
/// the two apart (§7 taxonomy entry 5 vs 6).
#[derive(Debug)]
struct ArtifactShapeFailure {
    target: TargetName,
    expected: &'static str,
}

impl fmt::Display for ArtifactShapeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` is not a {} after build", self.target, self.expected)
    }
}

impl std::error::Error for ArtifactShapeFailure {}

async fn verify(target: &str, target_type: TargetType) -> anyhow::Result<()> {
    let ok = match target_type {
        TargetType::File => fsutil::is_regular_file(target).await,
        TargetType::Directory => fsutil::is_directory(target).await,
        TargetType::Auto | TargetType::Phony => true,
    };
    if ok {
        return Ok(());
    }
    let expected = match target_type {
        TargetType::File => "regular file",
        TargetType::Directory => "directory",
        TargetType::Auto | TargetType::Phony => unreachable!("no verification for these types"),
    };
    Err(ArtifactShapeFailure { target: target.to_owned(), expected }.into())
}

async fn post_process(target: &str, target_type: TargetType) -> anyhow::Result<()> {
    if target_type == TargetType::Directory {
        fsutil::touch_directory(target).await?;
    }
    Ok(())
}

async fn apply_failure_policy(rule: &Rule, target: &str) {
    if !rule.keep_on_failure() {
        // Best-effort: a cleanup failure shouldn't mask the original error.
        let _ = fsutil::remove_recursive(target).await;
    }
}

async fn read_mtime(
    coordinator: &Coordinator,
    target: &str,
    trace: &[TargetName],
) -> Result<f64, BuildError> {
    freshness::effective_mtime(
        coordinator.oracle(),
        target,
        NotFoundPolicy::Sentinel(f64::NEG_INFINITY),
        f64::INFINITY,
    )
    .await
    .map_err(|e| BuildError::io(e, trace.to_vec()))
    .map(|v| v.expect("Sentinel policy always yields Some"))
}

pub async fn resolve(
    coordinator: &Arc<Coordinator>,
    target: TargetName,
    rule: Arc<Rule>,
    trace: Vec<TargetName>,
) -> Result<BuildResult, BuildError> {
    let mut trace_here = trace;
    trace_here.push(target.clone());

    let explicit_prereqs = rule
        .prereqs
        .materialize()
        .await
        .map_err(|e| BuildError::callable(e, trace_here.clone()))?;
    let mut prereqs = explicit_prereqs;
    prereqs.extend(coordinator.global_prereqs().iter().cloned());
    let prereqs = dedup_preserve_order(prereqs);

    let target_type = rule.target_type;
    let current_mtime = if target_type == TargetType::Phony {
        f64::NEG_INFINITY
    } else {
        read_mtime(coordinator, &target, &trace_here).await?
    };

    let latest_prereq = coordinator
        .build_all(prereqs.clone(), trace_here.clone(), coordinator.mode())
        .await?
        .mtime;

    if current_mtime != f64::NEG_INFINITY && latest_prereq <= current_mtime {
        coordinator.logger().log(&format!("`{target}` up to date"));
        return Ok(BuildResult::new(current_mtime));
    }

    let callable: Option<BuildCallable> = if rule.invoke.is_some() || rule.cmd.is_some() {
        Some(executor::resolve_callable(&rule, &trace_here)?)
    } else {
        None
    };
    let transformer = rule.transformer.clone();

    let ctx = BuildContext {
        target: target.clone(),
        trace: trace_here.clone(),
        prereqs,
        logger: coordinator.logger(),
        coordinator: Arc::clone(coordinator),
    };

    let inner: BuildCallable = {
        let target_type = target_type;
        let target_for_body = target.clone();
        Arc::new(move |ctx: BuildContext| {
            let callable = callable.clone();
            let target = target_for_body.clone();
            Box::pin(async move {
                match &callable {
                    Some(f) => f(ctx.clone()).await?,
                    None => ctx.logger.log(&format!("no rule for `{target}`; assumed up to date")),
                }
                verify(&target, target_type).await?;
                post_process(&target, target_type).await?;
                Ok(())
            }) as crate::rule::BoxFuture<'static, anyhow::Result<()>>
        })
    };

    let wrapped = match &transformer {
        Some(t) => t(inner),
        None => inner,
    };

    if let Err(e) = wrapped(ctx).await {
        apply_failure_policy(&rule, &target).await;
        let kind = match e.downcast_ref::<ArtifactShapeFailure>() {
            Some(shape) => BuildErrorKind::ArtifactShape {
                target: shape.target.clone(),
                expected: shape.expected,
            },
            None => BuildErrorKind::Callable(Arc::new(e)),
        };
        return Err(BuildError::new(kind, trace_here));
    }

    let new_mtime = if target_type == TargetType::Phony {
        f64::INFINITY
    } else {
        read_mtime(coordinator, &target, &trace_here).await?
    };
    coordinator.logger().log(&format!("built `{target}`"));
    Ok(BuildResult::new(new_mtime))
}
