//! Whether an app may be built, and tested, for a target.

use serde::Serialize;
use tracing::{debug, warn};

use crate::env::{Environment, VariableEnv};
use crate::expr::ExprError;
use crate::manifest::{FolderRule, IfClause};

/// Outcome of applying a folder rule to one `(target, config)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppEligibility {
    pub build_allowed: bool,
    /// Never true unless `build_allowed` is.
    pub test_allowed: bool,
    /// Why the build is not allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Why testing is not allowed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_reason: Option<String>,
    /// The deciding disable clause was marked temporary.
    pub temporary: bool,
}

impl AppEligibility {
    fn allowed() -> Self {
        Self {
            build_allowed: true,
            test_allowed: true,
            reason: None,
            test_reason: None,
            temporary: false,
        }
    }

    fn denied(reason: String, temporary: bool) -> Self {
        Self {
            build_allowed: false,
            test_allowed: false,
            reason: Some(reason.clone()),
            test_reason: Some(reason),
            temporary,
        }
    }
}

/// Apply `rule` (if any) to `target`/`config_name`.
///
/// An evaluation error denies the pair with the error as the reason.
pub fn eligible(rule: Option<&FolderRule>, target: &str, config_name: Option<&str>, env: &Environment) -> AppEligibility {
    let scope = env.scope(target, config_name);
    match evaluate(rule, &scope) {
        Ok(result) => result,
        Err((clause, err)) => {
            warn!(
                folder = rule.map(|r| r.folder.as_str()).unwrap_or("."),
                target,
                clause = %clause,
                error = %err,
                "rule evaluation failed, disabling"
            );
            AppEligibility::denied(format!("Failed to evaluate rule `{}`: {}", clause, err), false)
        }
    }
}

type EvalFailure = (String, ExprError);

fn evaluate(rule: Option<&FolderRule>, scope: &VariableEnv<'_>) -> Result<AppEligibility, EvalFailure> {
    let target = scope.target();
    let Some(rule) = rule else {
        return Ok(default_target_check(scope));
    };

    if rule.enable.is_empty() {
        let result = default_target_check(scope);
        if !result.build_allowed {
            return Ok(result);
        }
    } else if first_match(&rule.enable, scope)?.is_none() {
        let listed: Vec<String> = rule.enable.iter().map(|c| format!("- {}", c.expr)).collect();
        let reason = format!("Not enabled by manifest rules:\n{}", listed.join("\n"));
        debug!(folder = %rule.folder, target, "not enabled");
        return Ok(AppEligibility::denied(reason, false));
    }

    if let Some(clause) = first_match(&rule.disable, scope)? {
        debug!(folder = %rule.folder, target, clause = %clause.expr, "disabled by rule");
        return Ok(AppEligibility::denied(disabled_reason(clause), clause.temporary));
    }

    let mut result = AppEligibility::allowed();
    if let Some(clause) = first_match(&rule.disable_test, scope)? {
        debug!(folder = %rule.folder, target, clause = %clause.expr, "testing disabled by rule");
        result.test_allowed = false;
        result.test_reason = Some(disabled_reason(clause));
        result.temporary = clause.temporary;
    }
    Ok(result)
}

fn default_target_check(scope: &VariableEnv<'_>) -> AppEligibility {
    let env = scope.environment();
    if env.is_default_target(scope.target()) {
        return AppEligibility::allowed();
    }
    let reason = format!(
        "Target {} not in default build targets {}",
        scope.target(),
        env.default_build_targets().join(",")
    );
    AppEligibility::denied(reason, false)
}

fn first_match<'r>(clauses: &'r [IfClause], scope: &VariableEnv<'_>) -> Result<Option<&'r IfClause>, EvalFailure> {
    for clause in clauses {
        match clause.expr.evaluate(scope) {
            Ok(true) => return Ok(Some(clause)),
            Ok(false) => {}
            Err(e) => return Err((clause.expr.source().to_string(), e)),
        }
    }
    Ok(None)
}

/// `Disabled by manifest rule: <if> [(temporary)] [(reason: <r>)]`
fn disabled_reason(clause: &IfClause) -> String {
    let mut reason = format!("Disabled by manifest rule: {}", clause.expr);
    if clause.temporary {
        reason.push_str(" (temporary)");
    }
    if let Some(r) = &clause.reason {
        reason.push_str(&format!(" (reason: {})", r));
    }
    reason
}

/// Targets out of `targets` the app may be built for, sorted.
pub fn enable_build_targets(
    rule: Option<&FolderRule>,
    targets: &[String],
    config_name: Option<&str>,
    env: &Environment,
) -> Vec<String> {
    let mut out: Vec<String> = targets
        .iter()
        .filter(|t| eligible(rule, t, config_name, env).build_allowed)
        .cloned()
        .collect();
    out.sort();
    out
}

/// Targets out of `targets` the app may be tested on, sorted.
pub fn enable_test_targets(
    rule: Option<&FolderRule>,
    targets: &[String],
    config_name: Option<&str>,
    env: &Environment,
) -> Vec<String> {
    let mut out: Vec<String> = targets
        .iter()
        .filter(|t| eligible(rule, t, config_name, env).test_allowed)
        .cloned()
        .collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{Document, Manifest};
    use appgate_core::Version;
    use std::sync::Arc;

    fn env() -> Environment {
        Environment::new(Version::new(5, 3, 0), vec!["esp32".into(), "esp32s2".into()])
    }

    fn rule(yaml: &str) -> Arc<FolderRule> {
        let m = Manifest::load(&[Document::new("m.yml", yaml)], ".").unwrap();
        Arc::clone(m.get("app").unwrap())
    }

    #[test]
    fn no_rule_means_default_targets() {
        let e = env();
        assert!(eligible(None, "esp32", None, &e).build_allowed);
        let denied = eligible(None, "unsupported_target", None, &e);
        assert!(!denied.build_allowed);
        assert!(!denied.test_allowed);
        assert_eq!(
            denied.reason.as_deref(),
            Some("Target unsupported_target not in default build targets esp32,esp32s2")
        );
    }

    #[test]
    fn enable_list_overrides_defaults() {
        let r = rule("app:\n  enable:\n    - if: IDF_TARGET == \"esp32\"\n    - if: IDF_TARGET == \"esp32s2\"\n");
        let denied = eligible(Some(&r), "esp32s3", None, &env());
        assert!(!denied.build_allowed);
        assert_eq!(
            denied.reason.as_deref(),
            Some("Not enabled by manifest rules:\n- IDF_TARGET == \"esp32\"\n- IDF_TARGET == \"esp32s2\"")
        );
        assert_eq!(denied.test_reason, denied.reason);

        let r = rule("app:\n  enable:\n    - if: IDF_TARGET == \"esp32h2\"\n");
        assert!(eligible(Some(&r), "esp32h2", None, &env()).build_allowed);
    }

    #[test]
    fn disable_reason_formats() {
        let r = rule(
            r#"
app:
  disable:
    - if: IDF_TARGET == "esp32s2"
      reason: Not supported on this target
    - if: IDF_TARGET == "esp32"
      temporary: true
      reason: flaky
"#,
        );
        let a = eligible(Some(&r), "esp32s2", None, &env());
        assert_eq!(
            a.reason.as_deref(),
            Some(r#"Disabled by manifest rule: IDF_TARGET == "esp32s2" (reason: Not supported on this target)"#)
        );
        assert!(!a.temporary);

        let b = eligible(Some(&r), "esp32", None, &env());
        assert_eq!(
            b.reason.as_deref(),
            Some(r#"Disabled by manifest rule: IDF_TARGET == "esp32" (temporary) (reason: flaky)"#)
        );
        assert!(b.temporary);
    }

    #[test]
    fn disable_test_keeps_build() {
        let r = rule("app:\n  disable_test:\n    - if: IDF_TARGET == \"esp32\"\n      temporary: true\n      reason: Flaky tests\n");
        let a = eligible(Some(&r), "esp32", None, &env());
        assert!(a.build_allowed);
        assert!(!a.test_allowed);
        assert!(a.reason.is_none());
        assert_eq!(
            a.test_reason.as_deref(),
            Some(r#"Disabled by manifest rule: IDF_TARGET == "esp32" (temporary) (reason: Flaky tests)"#)
        );
    }

    #[test]
    fn evaluation_error_denies_pair() {
        let r = rule("app:\n  disable:\n    - if: IDF_TARGET < [1, 2]\n");
        let a = eligible(Some(&r), "esp32", None, &env());
        assert!(!a.build_allowed);
        assert!(a.reason.unwrap().starts_with("Failed to evaluate rule `IDF_TARGET < [1, 2]`"));
    }

    #[test]
    fn test_allowed_implies_build_allowed() {
        let r = rule(
            r#"
app:
  enable:
    - if: IDF_TARGET in ["esp32", "esp32s2", "esp32c3"]
  disable:
    - if: IDF_TARGET == "esp32c3"
  disable_test:
    - if: IDF_TARGET == "esp32s2"
"#,
        );
        for t in ["esp32", "esp32s2", "esp32c3", "esp32h2"] {
            let a = eligible(Some(&r), t, None, &env());
            assert!(!a.test_allowed || a.build_allowed, "{t}");
        }
    }

    #[test]
    fn target_lists() {
        let r = rule("app:\n  enable:\n    - if: INCLUDE_DEFAULT == 1 or IDF_TARGET == \"esp32h2\"\n  disable_test:\n    - if: IDF_TARGET == \"esp32s2\"\n");
        let all: Vec<String> = ["esp32", "esp32s2", "esp32h2", "esp32p4"].iter().map(|s| s.to_string()).collect();
        assert_eq!(enable_build_targets(Some(&r), &all, None, &env()), vec!["esp32", "esp32h2", "esp32s2"]);
        assert_eq!(enable_test_targets(Some(&r), &all, None, &env()), vec!["esp32", "esp32h2"]);
    }
}
