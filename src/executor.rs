// Copyright (c) tdb contributors.
//
// This source code is licensed under both the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree and the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree.

//! The Rule Executor (§4.4): turns a declarative [`Rule`] into the single
//! [`BuildCallable`] the resolver invokes, rewriting `tdb:`-prefixed command
//! arguments along the way.

use crate::context::BuildContext;
use crate::error::BuildError;
use crate::error::BuildErrorKind;
use crate::process;
use crate::rule::BuildCallable;
use crate::rule::Rule;

const DIRECTIVE_PREFIX: &str = "tdb:";
const LITERAL_PREFIX: &str = "tdb:literal:";

/// Rewrites one `cmd` argument against the current [`BuildContext`]. Plain
/// arguments (no `tdb:` prefix) pass through unchanged.
fn rewrite_arg(arg: &str, ctx: &BuildContext) -> Result<Vec<String>, BuildError> {
    if let Some(text) = arg.strip_prefix(LITERAL_PREFIX) {
        return Ok(vec![text.to_owned()]);
    }
    match arg {
        "tdb:target" => Ok(vec![ctx.target.clone()]),
        "tdb:prereq" => {
            if ctx.prereqs.len() != 1 {
                return Err(BuildError::command_rewrite(
                    format!(
                        "`tdb:prereq` requires exactly one prerequisite, `{}` has {}",
                        ctx.target,
                        ctx.prereqs.len()
                    ),
                    ctx.trace.clone(),
                ));
            }
            Ok(vec![ctx.prereqs[0].clone()])
        }
        "tdb:prereqs" => Ok(ctx.prereqs.clone()),
        other if other.starts_with(DIRECTIVE_PREFIX) => Err(BuildError::command_rewrite(
            format!("unknown directive `{other}`"),
            ctx.trace.clone(),
        )),
        plain => Ok(vec![plain.to_owned()]),
    }
}

/// Expands every argument in `cmd`, flattening multi-value rewrites (e.g.
/// `tdb:prereqs`) in place.
fn rewrite_cmd(cmd: &[String], ctx: &BuildContext) -> Result<Vec<String>, BuildError> {
    let mut out = Vec::with_capacity(cmd.len());
    for arg in cmd {
        out.extend(rewrite_arg(arg, ctx)?);
    }
    Ok(out)
}

/// Resolves a rule's `invoke`/`cmd` fields into the single callable the
/// resolver runs, enforcing that exactly one of them is present.
pub fn resolve_callable(rule: &Rule, trace: &[String]) -> Result<BuildCallable, BuildError> {
    match (&rule.invoke, &rule.cmd) {
        (Some(_), Some(_)) => Err(BuildError::configuration(
            "rule specifies both `invoke` and `cmd`; exactly one is required",
            trace.to_vec(),
        )),
        (None, None) => Err(BuildError::configuration(
            "rule specifies neither `invoke` nor `cmd`",
            trace.to_vec(),
        )),
        (Some(invoke), None) => {
            let invoke = invoke.clone();
            Ok(invoke)
        }
        (None, Some(cmd)) => {
            let cmd = cmd.clone();
            Ok(command_callable(cmd))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::logger::NullLogger;
    use crate::rule::BoxFuture;

    fn ctx(target: &str, prereqs: Vec<&str>) -> BuildContext {
        BuildContext {
            target: target.to_owned(),
            trace: vec![target.to_owned()],
            prereqs: prereqs.into_iter().map(str::to_owned).collect(),
            logger: Arc::new(NullLogger),
            coordinator: test_coordinator(),
        }
    }

    fn test_coordinator() -> Arc<crate::coordinator::Coordinator> {
        let config = crate::config::CoordinatorConfig::new(crate::registry::RuleRegistry::new(Vec::new()));
        crate::coordinator::Coordinator::new(config)
    }

    #[test]
    fn literal_passes_through_verbatim() {
        let c = ctx("out.o", vec![]);
        assert_eq!(rewrite_arg("tdb:literal:tdb:target", &c).unwrap(), vec!["tdb:target".to_string()]);
    }

    #[test]
    fn target_directive_expands_to_target_name() {
        let c = ctx("out.o", vec![]);
        assert_eq!(rewrite_arg("tdb:target", &c).unwrap(), vec!["out.o".to_string()]);
    }

    #[test]
    fn single_prereq_directive() {
        let c = ctx("out.o", vec!["in.c"]);
        assert_eq!(rewrite_arg("tdb:prereq", &c).unwrap(), vec!["in.c".to_string()]);
    }

    #[test]
    fn single_prereq_directive_errors_without_exactly_one() {
        let c = ctx("out.o", vec![]);
        assert!(rewrite_arg("tdb:prereq", &c).is_err());
        let c = ctx("out.o", vec!["a", "b"]);
        assert!(rewrite_arg("tdb:prereq", &c).is_err());
    }

    #[test]
    fn prereqs_directive_splices_all() {
        let c = ctx("out.o", vec!["a.c", "b.c"]);
        assert_eq!(
            rewrite_arg("tdb:prereqs", &c).unwrap(),
            vec!["a.c".to_string(), "b.c".to_string()]
        );
    }

    #[test]
    fn unknown_directive_is_an_error() {
        let c = ctx("out.o", vec![]);
        assert!(rewrite_arg("tdb:bogus", &c).is_err());
    }

    #[test]
    fn plain_argument_passes_through() {
        let c = ctx("out.o", vec![]);
        assert_eq!(rewrite_arg("-Wall", &c).unwrap(), vec!["-Wall".to_string()]);
    }

    #[test]
    fn rewrite_cmd_flattens_prereqs_splice() {
        let c = ctx("out.o", vec!["a.c", "b.c"]);
        let out = rewrite_cmd(&["cc".to_string(), "-o".to_string(), "tdb:target".to_string(), "tdb:prereqs".to_string()], &c).unwrap();
        assert_eq!(out, vec!["cc", "-o", "out.o", "a.c", "b.c"]);
    }

    #[test]
    fn both_invoke_and_cmd_is_a_configuration_error() {
        let rule = Rule::new()
            .with_invoke(Arc::new(|_ctx| Box::pin(async { Ok::<(), anyhow::Error>(()) }) as BoxFuture<'static, anyhow::Result<()>>))
            .with_cmd(vec!["echo"]);
        let err = resolve_callable(&rule, &[]).unwrap_err();
        assert!(matches!(err.kind, BuildErrorKind::Configuration(_)));
    }

    #[test]
    fn neither_invoke_nor_cmd_is_a_configuration_error() {
        let rule = Rule::new();
        let err = resolve_callable(&rule, &[]).unwrap_err();
        assert!(matches!(err.kind, BuildErrorKind::Configuration(_)));
    }
}

fn command_callable(cmd: Vec<String>) -> BuildCallable {
    std::sync::Arc::new(move |ctx: BuildContext| {
        let cmd = cmd.clone();
        Box::pin(async move {
            let argv = rewrite_cmd(&cmd, &ctx).map_err(anyhow::Error::from)?;
            let output = process::run_command(&argv).await.map_err(anyhow::Error::from)?;
            if !output.success() {
                anyhow::bail!(
                    "command {:?} exited with status {:?}\nstdout:\n{}\nstderr:\n{}",
                    argv,
                    output.status_code,
                    String::from_utf8_lossy(&output.stdout),
                    String::from_utf8_lossy(&output.stderr),
                );
            }
            Ok(())
        }) as crate::rule::BoxFuture<'static, anyhow::Result<()>>
    })
}
