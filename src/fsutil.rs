// Copyright (c) tdb contributors.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! Ambient filesystem helpers the core needs internally (recursive removal,
//! directory mtime repair). Recursive copy and parent-directory creation for
//! rule authors are explicitly out of scope (§1). These are only the bits
//! the engine itself calls.

use std::path::Path;

use tokio::fs;

/// Removes `path` recursively, tolerating "already gone". Used for the
/// failure-file policy (§4.3) and in tests.
pub async fn remove_recursive(path: &str) -> std::io::Result<()> {
    let meta = match fs::symlink_metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    let result = if meta.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Refreshes a directory's own mtime by creating and immediately removing a
/// short-lived placeholder file inside it, a portable stand-in for `utime`,
/// since some filesystems don't bump a directory's mtime just because a
/// *nested* file changed (§4.3 post-processing).
pub async fn touch_directory(path: &str) -> std::io::Result<()> {
    let marker = Path::new(path).join(format!(".tdb-touch-{}", std::process::id()));
    fs::write(&marker, b"").await?;
    fs::remove_file(&marker).await
}

/// True if `path` exists and is a regular file.
pub async fn is_regular_file(path: &str) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

/// True if `path` exists and is a directory.
pub async fn is_directory(path: &str) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}
