// Copyright (c) tdb contributors.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! End-to-end scenarios exercising the Coordinator against a real
//! filesystem, mirroring the seed-test list.

use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;

use tdb::context::BuildContext;
use tdb::error::BuildErrorKind;
use tdb::freshness::LayeredOracle;
use tdb::freshness::MtimeOracle;
use tdb::logger::NullLogger;
use tdb::rule::BoxFuture;
use tdb::ConcurrencyMode;
use tdb::Coordinator;
use tdb::CoordinatorConfig;
use tdb::Prereqs;
use tdb::Rule;
use tdb::RuleRegistry;
use tdb::TargetType;

fn path_of(dir: &tempfile::TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

fn writer_rule(path: String, content: &'static str, prereqs: Vec<String>) -> Rule {
    Rule::new()
        .with_prereqs(Prereqs::Eager(prereqs))
        .with_target_type(TargetType::File)
        .with_invoke(Arc::new(move |_ctx: BuildContext| {
            let path = path.clone();
            Box::pin(async move {
                tokio::fs::write(&path, content).await?;
                Ok(())
            }) as BoxFuture<'static, anyhow::Result<()>>
        }))
}

fn config(rules: Vec<(String, Rule)>) -> CoordinatorConfig {
    CoordinatorConfig::new(RuleRegistry::new(rules))
        .with_logger(Arc::new(NullLogger))
        .with_mode(ConcurrencyMode::Parallel)
}

#[tokio::test]
async fn rebuilds_a_stale_target() {
    let dir = tempfile::tempdir().unwrap();
    let out = path_of(&dir, "out.txt");

    let coordinator = Coordinator::new(config(vec![(out.clone(), writer_rule(out.clone(), "hello", vec![]))]));
    let result = coordinator.build(out.clone(), Vec::new()).await.unwrap();

    assert!(result.mtime.is_finite());
    assert_eq!(tokio::fs::read_to_string(&out).await.unwrap(), "hello");
}

#[tokio::test]
async fn skips_a_target_already_newer_than_its_prereq() {
    let dir = tempfile::tempdir().unwrap();
    let prereq = path_of(&dir, "in.txt");
    let out = path_of(&dir, "out.txt");

    tokio::fs::write(&prereq, "source").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    tokio::fs::write(&out, "already built").await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_for_rule = Arc::clone(&calls);
    let rule = Rule::new()
        .with_prereqs(Prereqs::Eager(vec![prereq.clone()]))
        .with_target_type(TargetType::File)
        .with_invoke(Arc::new(move |_ctx: BuildContext| {
            let calls = Arc::clone(&calls_for_rule);
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }) as BoxFuture<'static, anyhow::Result<()>>
        }));

    let coordinator = Coordinator::new(config(vec![(out.clone(), rule)]));
    coordinator.build(out.clone(), Vec::new()).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0, "up-to-date target must not be rebuilt");
}

struct FixedMtimeOracle(HashMap<String, f64>);

#[async_trait]
impl MtimeOracle for FixedMtimeOracle {
    async fn mtime(&self, path: &str, _short_circuit: f64) -> std::io::Result<Option<f64>> {
        Ok(self.0.get(path).copied())
    }
}

#[tokio::test]
async fn sidecar_oracle_overrides_filesystem_mtime() {
    let dir = tempfile::tempdir().unwrap();
    let prereq = path_of(&dir, "in.txt");
    let out = path_of(&dir, "out.txt");

    tokio::fs::write(&prereq, "source").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    tokio::fs::write(&out, "already built, but pretend it's ancient").await.unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let calls_for_rule = Arc::clone(&calls);
    let out_for_rule = out.clone();
    let rule = Rule::new()
        .with_prereqs(Prereqs::Eager(vec![prereq.clone()]))
        .with_target_type(TargetType::File)
        .with_invoke(Arc::new(move |_ctx: BuildContext| {
            let calls = Arc::clone(&calls_for_rule);
            let out = out_for_rule.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::fs::write(&out, "rebuilt").await?;
                Ok(())
            }) as BoxFuture<'static, anyhow::Result<()>>
        }));

    let mut overrides = HashMap::new();
    overrides.insert(out.clone(), f64::NEG_INFINITY);

    let oracle = LayeredOracle::new(Some(Box::new(FixedMtimeOracle(overrides))));
    let coordinator = Coordinator::with_oracle(config(vec![(out.clone(), rule)]), Box::new(oracle));

    coordinator.build(out, Vec::new()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1, "sidecar override should force a rebuild");
}

#[tokio::test]
async fn missing_target_with_no_rule_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let ghost = path_of(&dir, "does-not-exist.txt");

    let coordinator = Coordinator::new(config(vec![]));
    let err = coordinator.build(ghost.clone(), Vec::new()).await.unwrap_err();

    assert!(matches!(err.kind, BuildErrorKind::MissingTarget(ref t) if t == &ghost));
}

#[tokio::test]
async fn failing_file_target_is_deleted_but_failing_directory_target_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let file_out = path_of(&dir, "partial.txt");
    let dir_out = path_of(&dir, "partial_dir");

    let failing_file_rule = Rule::new().with_target_type(TargetType::File).with_invoke(Arc::new({
        let file_out = file_out.clone();
        move |_ctx: BuildContext| {
            let file_out = file_out.clone();
            Box::pin(async move {
                tokio::fs::write(&file_out, "partial").await?;
                anyhow::bail!("build step failed after writing a partial artifact")
            }) as BoxFuture<'static, anyhow::Result<()>>
        }
    }));

    let failing_dir_rule = Rule::new().with_target_type(TargetType::Directory).with_invoke(Arc::new({
        let dir_out = dir_out.clone();
        move |_ctx: BuildContext| {
            let dir_out = dir_out.clone();
            Box::pin(async move {
                tokio::fs::create_dir_all(&dir_out).await?;
                anyhow::bail!("build step failed after creating a partial directory")
            }) as BoxFuture<'static, anyhow::Result<()>>
        }
    }));

    let coordinator = Coordinator::new(config(vec![
        (file_out.clone(), failing_file_rule),
        (dir_out.clone(), failing_dir_rule),
    ]));

    assert!(coordinator.build(file_out.clone(), Vec::new()).await.is_err());
    assert!(coordinator.build(dir_out.clone(), Vec::new()).await.is_err());

    assert!(tokio::fs::metadata(&file_out).await.is_err(), "file target should be deleted on failure");
    assert!(tokio::fs::metadata(&dir_out).await.is_ok(), "directory target should be kept on failure");
}

#[tokio::test]
async fn diamond_shared_prereq_is_built_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let a = path_of(&dir, "a.txt");
    let b = path_of(&dir, "b.txt");
    let c = path_of(&dir, "c.txt");
    let d = path_of(&dir, "d.txt");

    let a_calls = Arc::new(AtomicUsize::new(0));
    let a_calls_for_rule = Arc::clone(&a_calls);
    let a_rule = Rule::new().with_target_type(TargetType::File).with_invoke(Arc::new({
        let a = a.clone();
        move |_ctx: BuildContext| {
            let a = a.clone();
            let a_calls = Arc::clone(&a_calls_for_rule);
            Box::pin(async move {
                a_calls.fetch_add(1, Ordering::SeqCst);
                tokio::fs::write(&a, "a").await?;
                Ok(())
            }) as BoxFuture<'static, anyhow::Result<()>>
        }
    }));

    let b_rule = writer_rule(b.clone(), "b", vec![a.clone()]);
    let c_rule = writer_rule(c.clone(), "c", vec![a.clone()]);
    let d_rule = writer_rule(d.clone(), "d", vec![b.clone(), c.clone()]);

    let coordinator = Coordinator::new(config(vec![
        (a.clone(), a_rule),
        (b.clone(), b_rule),
        (c.clone(), c_rule),
        (d.clone(), d_rule),
    ]));

    coordinator.build(d.clone(), Vec::new()).await.unwrap();
    coordinator.join().await;

    assert_eq!(a_calls.load(Ordering::SeqCst), 1, "shared prereq must build exactly once");
}

#[tokio::test]
async fn a_cycle_is_reported_instead_of_deadlocking() {
    let dir = tempfile::tempdir().unwrap();
    let a = path_of(&dir, "a.txt");
    let b = path_of(&dir, "b.txt");

    let a_rule = writer_rule(a.clone(), "a", vec![b.clone()]);
    let b_rule = writer_rule(b.clone(), "b", vec![a.clone()]);

    let coordinator = Coordinator::new(config(vec![(a.clone(), a_rule), (b.clone(), b_rule)]));

    let err = tokio::time::timeout(std::time::Duration::from_secs(5), coordinator.build(a.clone(), Vec::new()))
        .await
        .expect("cycle must be reported rather than hang")
        .unwrap_err();

    assert!(matches!(err.kind, BuildErrorKind::Cycle(ref t) if t == &a));
}
