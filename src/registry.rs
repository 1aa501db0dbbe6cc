// Copyright (c) tdb contributors.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The Rule Registry (§4.1).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::rule::GeneratedRulesHook;
use crate::rule::Rule;
use crate::target::TargetName;

/// Stores rules keyed by target name; supports a lazily-materialized
/// "generated rules" hook that is invoked at most once and cached forever
/// after (`tokio::sync::OnceCell` gives us the async get-or-init idiom for
/// free, the same shape the teacher uses for lazily-initialized daemon
/// state).
pub struct RuleRegistry {
    static_rules: Vec<(TargetName, Arc<Rule>)>,
    static_by_name: HashMap<TargetName, Arc<Rule>>,
    generated_hook: Option<GeneratedRulesHook>,
    merged: OnceCell<Merged>,
}

struct Merged {
    by_name: HashMap<TargetName, Arc<Rule>>,
    /// Enumeration order for listing commands: static-first, then generated,
    /// each preserving insertion order (§4.1).
    order: Vec<TargetName>,
}

impl RuleRegistry {
    pub fn new(static_rules: Vec<(TargetName, Rule)>) -> Self {
        let static_rules: Vec<(TargetName, Arc<Rule>)> =
            static_rules.into_iter().map(|(n, r)| (n, Arc::new(r))).collect();
        let static_by_name = static_rules.iter().cloned().collect();
        Self {
            static_rules,
            static_by_name,
            generated_hook: None,
            merged: OnceCell::new(),
        }
    }

    pub fn with_generated_hook(mut self, hook: GeneratedRulesHook) -> Self {
        self.generated_hook = Some(hook);
        self
    }

    /// Looks up a single rule, materializing the generated-rules map on
    /// first call if necessary.
    pub async fn lookup(&self, name: &str) -> anyhow::Result<Option<Arc<Rule>>> {
        let merged = self.materialize().await?;
        Ok(merged.by_name.get(name).cloned())
    }

    /// Returns the full static-then-generated enumeration order, for
    /// `--list-targets`/`--describe-targets`.
    pub async fn enumerate(&self) -> anyhow::Result<Vec<(TargetName, Arc<Rule>)>> {
        let merged = self.materialize().await?;
        Ok(merged
            .order
            .iter()
            .map(|name| (name.clone(), merged.by_name[name].clone()))
            .collect())
    }

    async fn materialize(&self) -> anyhow::Result<&Merged> {
        self.merged
            .get_or_try_init(|| async {
                let mut by_name = self.static_by_name.clone();
                let mut order: Vec<TargetName> =
                    self.static_rules.iter().map(|(n, _)| n.clone()).collect();

                if let Some(hook) = &self.generated_hook {
                    // Generated entries overwrite static ones on key
                    // collision, per §9's open question. Not left to
                    // implementer taste.
                    for (name, rule) in hook().await? {
                        if !by_name.contains_key(&name) {
                            order.push(name.clone());
                        }
                        by_name.insert(name, rule);
                    }
                }

                Ok(Merged { by_name, order })
            })
            .await
    }
}
