//! Drives an app from `unknown` to `disabled`, `skipped` or `should_build`.

use serde::Serialize;
use tracing::{debug, warn};

use appgate_core::{App, BuildStatus, Result};

use crate::deps::{BuildDecision, DependencyMatcher};
use crate::eligibility::{eligible, AppEligibility};
use crate::env::Environment;
use crate::resolver::RuleResolver;

/// Machine-readable classification of one app.
#[derive(Debug, Clone, Serialize)]
pub struct AppRecord {
    pub app_dir: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_name: Option<String>,
    /// Folder of the governing rule, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_folder: Option<String>,
    pub status: BuildStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub eligibility: AppEligibility,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<BuildDecision>,
}

/// Read-only bundle of everything needed to classify apps; shareable
/// across threads once the resolver is warmed.
pub struct Classifier<'a> {
    resolver: &'a RuleResolver,
    env: &'a Environment,
    matcher: &'a DependencyMatcher,
}

impl<'a> Classifier<'a> {
    pub fn new(resolver: &'a RuleResolver, env: &'a Environment, matcher: &'a DependencyMatcher) -> Self {
        Self { resolver, env, matcher }
    }

    /// Classify `app`, which must still be `unknown`.
    ///
    /// `reported` is the build system's dependency list for the app, if known.
    pub fn classify(&self, app: &mut App, reported: Option<&[String]>) -> Result<AppRecord> {
        let rule = self.resolver.resolve(&app.app_dir);
        let eligibility = eligible(rule.as_deref(), &app.target, app.config_name.as_deref(), self.env);

        let mut decision = None;
        if !eligibility.build_allowed {
            app.state.transition(BuildStatus::Disabled, eligibility.reason.clone())?;
        } else {
            match self.matcher.should_build(app, rule.as_deref(), self.env, reported) {
                Ok(d) => {
                    let next = if d.build {
                        BuildStatus::ShouldBuild
                    } else {
                        BuildStatus::Skipped
                    };
                    app.state.transition(next, Some(d.reason.clone()))?;
                    decision = Some(d);
                }
                Err(e) => {
                    warn!(app = %app, error = %e, "dependency switch evaluation failed, disabling");
                    app.state
                        .transition(BuildStatus::Disabled, Some(format!("Failed to evaluate dependencies: {}", e)))?;
                }
            }
        }

        debug!(app = %app, status = %app.status(), "classified");
        Ok(AppRecord {
            app_dir: app.app_dir.clone(),
            target: app.target.clone(),
            config_name: app.config_name.clone(),
            rule_folder: rule.map(|r| r.folder.clone()),
            status: app.status(),
            reason: app.state.reason.clone(),
            eligibility,
            decision,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use appgate_core::Version;

    use super::*;
    use crate::manifest::{Document, Manifest};

    const RULES: &str = r#"
apps/wifi:
  enable:
    - if: IDF_TARGET == "esp32"
  depends_components: [esp_wifi]
apps/switchy:
  depends_components:
    - if: IDF_TARGET < [1]
      content: [x]
"#;

    fn setup() -> (RuleResolver, Environment) {
        let m = Manifest::load(&[Document::new("m.yml", RULES)], ".").unwrap();
        let env = Environment::new(Version::new(5, 3, 0), vec!["esp32".into(), "esp32s3".into()]);
        (RuleResolver::new(Arc::new(m)), env)
    }

    #[test]
    fn classification_outcomes() {
        let (resolver, env) = setup();
        let matcher = DependencyMatcher::new(".", Some(vec!["esp_wifi"]), None::<Vec<String>>);
        let classifier = Classifier::new(&resolver, &env, &matcher);

        let mut built = App::new("apps/wifi/scan", "esp32", None);
        let rec = classifier.classify(&mut built, None).unwrap();
        assert_eq!(rec.status, BuildStatus::ShouldBuild);
        assert_eq!(rec.rule_folder.as_deref(), Some("apps/wifi"));

        let mut disabled = App::new("apps/wifi/scan", "esp32s3", None);
        let rec = classifier.classify(&mut disabled, None).unwrap();
        assert_eq!(rec.status, BuildStatus::Disabled);
        assert!(rec.reason.unwrap().starts_with("Not enabled by manifest rules"));

        let matcher = DependencyMatcher::new(".", Some(vec!["bt"]), None::<Vec<String>>);
        let classifier = Classifier::new(&resolver, &env, &matcher);
        let mut skipped = App::new("apps/wifi/scan", "esp32", None);
        assert_eq!(classifier.classify(&mut skipped, None).unwrap().status, BuildStatus::Skipped);
    }

    #[test]
    fn switch_errors_disable_only_that_app() {
        let (resolver, env) = setup();
        let matcher = DependencyMatcher::new(".", Some(vec!["x"]), None::<Vec<String>>);
        let classifier = Classifier::new(&resolver, &env, &matcher);

        let mut broken = App::new("apps/switchy", "esp32", None);
        let rec = classifier.classify(&mut broken, None).unwrap();
        assert_eq!(rec.status, BuildStatus::Disabled);
        assert!(rec.reason.unwrap().contains("Failed to evaluate dependencies"));

        let mut fine = App::new("apps/other", "esp32", None);
        assert_eq!(classifier.classify(&mut fine, None).unwrap().status, BuildStatus::ShouldBuild);
    }

    #[test]
    fn classifying_twice_fails() {
        let (resolver, env) = setup();
        let matcher = DependencyMatcher::new(".", None::<Vec<String>>, None::<Vec<String>>);
        let classifier = Classifier::new(&resolver, &env, &matcher);
        let mut app = App::new("apps/other", "esp32", None);
        classifier.classify(&mut app, None).unwrap();
        assert!(classifier.classify(&mut app, None).is_err());
    }
}
