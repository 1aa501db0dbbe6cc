// Copyright (c) tdb contributors.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The data model's smallest pieces: target names and target types.

/// A target name. Doubles as a filesystem path for `file`/`directory`/`auto`
/// targets. Normalization to forward slashes happens once, at the CLI
/// boundary (see [`crate::cli`]). Everywhere else a `TargetName` is assumed
/// already normalized.
pub type TargetName = String;

/// The kind of artifact (if any) a target corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetType {
    /// No post-build verification; mtime is read if the path happens to
    /// exist. The default.
    #[default]
    Auto,
    /// Must be a regular file after a successful build.
    File,
    /// Must be a directory after a successful build.
    Directory,
    /// Never corresponds to a filesystem artifact. Always stale.
    Phony,
}

impl TargetType {
    /// Default failure-file policy when the rule doesn't specify one:
    /// delete the artifact iff it's a `file`, keep it otherwise.
    pub fn default_keep_on_failure(self) -> bool {
        !matches!(self, TargetType::File)
    }
}

/// Removes duplicates, keeping the first occurrence - the rule Invariant 2
/// and `buildAll` both rely on (§3, §4.2).
pub fn dedup_preserve_order(names: impl IntoIterator<Item = TargetName>) -> Vec<TargetName> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for name in names {
        if seen.insert(name.clone()) {
            out.push(name);
        }
    }
    out
}
