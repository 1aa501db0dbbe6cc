// Copyright (c) tdb contributors.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The Freshness Oracle (§4.5): computes the "effective mtime" of a path,
//! recursively for directories, with a pluggable alternate source for users
//! who track freshness some other way (content hashes, sidecar timestamps).

use std::path::Path;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use futures::future::FutureExt;
use tokio::fs;

use crate::rule::BoxFuture;

fn system_time_to_millis(t: SystemTime) -> f64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64() * 1000.0,
        // A modification time before the epoch is exotic but not a reason
        // to panic; treat it as "very old" rather than erroring.
        Err(_) => f64::NEG_INFINITY,
    }
}

/// The capability every mtime source implements: "what's the mtime of this
/// path, or is it absent". `Ok(None)` means "I don't have an opinion" for an
/// alternate oracle (falls through to the filesystem), and "not found" for
/// the filesystem oracle itself.
#[async_trait]
pub trait MtimeOracle: Send + Sync {
    async fn mtime(&self, path: &str, short_circuit: f64) -> std::io::Result<Option<f64>>;
}

/// The filesystem-backed oracle: recursive max over directory trees.
pub struct FsOracle;

#[async_trait]
impl MtimeOracle for FsOracle {
    async fn mtime(&self, path: &str, short_circuit: f64) -> std::io::Result<Option<f64>> {
        mtime_recursive(Path::new(path), short_circuit).await
    }
}

/// `async fn`s can't directly recurse (the resulting future would have
/// infinite size), so descent is boxed explicitly, the same `BoxFuture`
/// idiom the rest of the crate uses at `dyn Fn` boundaries.
fn mtime_recursive<'a>(path: &'a Path, short_circuit: f64) -> BoxFuture<'a, std::io::Result<Option<f64>>> {
    async move {
        let meta = match fs::symlink_metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let own = system_time_to_millis(meta.modified()?);
        if !meta.is_dir() {
            return Ok(Some(own));
        }

        let mut max = own;
        let mut entries = fs::read_dir(path).await?;
        while let Some(entry) = entries.next_entry().await? {
            // `read_dir` never yields `.`/`..`, but the spec calls for
            // skipping them defensively, so we do.
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            if let Some(child_max) = mtime_recursive(&entry.path(), short_circuit).await? {
                if child_max > max {
                    max = child_max;
                }
                if max >= short_circuit {
                    return Ok(Some(f64::INFINITY));
                }
            }
        }
        Ok(Some(max))
    }
    .boxed()
}

/// Tries an optional alternate oracle first (e.g. a sidecar-timestamp
/// reader), falling back to the filesystem when the alternate has no
/// opinion. This is the plug-in point described in §4.5 and exercised by the
/// "sidecar mtime override" scenario in §8.
pub struct LayeredOracle {
    alternate: Option<Box<dyn MtimeOracle>>,
    fs: FsOracle,
}

impl LayeredOracle {
    pub fn new(alternate: Option<Box<dyn MtimeOracle>>) -> Self {
        Self { alternate, fs: FsOracle }
    }

    pub fn filesystem_only() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl MtimeOracle for LayeredOracle {
    async fn mtime(&self, path: &str, short_circuit: f64) -> std::io::Result<Option<f64>> {
        if let Some(alt) = &self.alternate {
            if let Some(v) = alt.mtime(path, short_circuit).await? {
                return Ok(Some(v));
            }
        }
        self.fs.mtime(path, short_circuit).await
    }
}

/// What to report when the path doesn't exist at all.
#[derive(Debug, Clone, Copy)]
pub enum NotFoundPolicy {
    /// Report this sentinel value (usually `-∞`).
    Sentinel(f64),
    /// Propagate a not-found failure instead.
    Error,
}

/// Resolves a path's mtime through `oracle`, applying `not_found` and the
/// `+∞` short-circuit hint (§4.5's `mtime(path, notFoundPolicy,
/// shortCircuit)` contract).
pub async fn effective_mtime(
    oracle: &dyn MtimeOracle,
    path: &str,
    not_found: NotFoundPolicy,
    short_circuit: f64,
) -> std::io::Result<Option<f64>> {
    match oracle.mtime(path, short_circuit).await? {
        Some(v) => Ok(Some(v)),
        None => match not_found {
            NotFoundPolicy::Sentinel(v) => Ok(Some(v)),
            NotFoundPolicy::Error => Ok(None),
        },
    }
}
