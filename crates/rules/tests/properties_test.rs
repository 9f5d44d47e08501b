//! End-to-end checks of the gating pipeline: manifest load, resolution,
//! eligibility, dependency decisions and status classification.

use std::collections::HashMap;
use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use appgate_core::{App, BuildStatus, Version};
use appgate_rules::expr::Lookup;
use appgate_rules::{
    eligible, CapabilityTable, Classifier, DependencyMatcher, Document, Environment, Expression, Manifest,
    ManifestLoader, RuleResolver, Value,
};

fn manifest(yaml: &str) -> Manifest {
    Manifest::load(&[Document::new("manifest.yml", yaml)], ".").unwrap()
}

fn env() -> Environment {
    Environment::new(Version::new(5, 3, 0), vec!["esp32".into(), "esp32s2".into(), "esp32s3".into()])
}

// ── Expressions ─────────────────────────────────────────────────────

#[test]
fn literal_equals_itself() {
    let empty: HashMap<String, Value> = HashMap::new();
    for lit in ["0", "42", "0x1f", r#""esp32""#, r#""""#, "[1, 2]", r#"["a", 3]"#] {
        let src = format!("{lit} == {lit}");
        let expr = Expression::compile(&src).unwrap();
        assert!(expr.evaluate(&empty).unwrap(), "{src}");
    }
}

#[test]
fn chained_and_ignores_third_operand() {
    let mut vars: HashMap<String, Value> = HashMap::new();
    vars.insert("A".into(), Value::Int(1));
    vars.insert("B".into(), Value::Int(2));

    let short = Expression::compile("A == 1 and B == 2").unwrap();
    let long = Expression::compile("A == 1 and B == 2 and C == 3").unwrap();
    for c in [0, 3, 99] {
        vars.insert("C".into(), Value::Int(c));
        assert_eq!(short.evaluate(&vars).unwrap(), long.evaluate(&vars).unwrap(), "C = {c}");
    }
}

#[test]
fn capability_disable_uses_configured_reason() {
    let m = manifest(
        r#"
bt_app:
  disable:
    - if: SOC_BT_SUPPORTED != 1
      reason: needs bluetooth
"#,
    );
    let mut caps = CapabilityTable::new();
    caps.insert("esp32", "SOC_BT_SUPPORTED", 1).insert("esp32s2", "SOC_BT_SUPPORTED", 0);
    let env = env().with_capabilities(Arc::new(caps));
    let rule = m.get("bt_app").map(|r| &**r);

    let s2 = eligible(rule, "esp32s2", None, &env);
    assert!(!s2.build_allowed);
    assert_eq!(
        s2.reason.as_deref(),
        Some("Disabled by manifest rule: SOC_BT_SUPPORTED != 1 (reason: needs bluetooth)")
    );
    assert!(eligible(rule, "esp32", None, &env).build_allowed);
}

#[test]
fn enable_single_target() {
    let m = manifest("only32:\n  enable:\n    - if: IDF_TARGET == \"esp32\"\n");
    let rule = m.get("only32").map(|r| &**r);
    assert!(eligible(rule, "esp32", None, &env()).build_allowed);
    assert!(!eligible(rule, "esp32s2", None, &env()).build_allowed);
}

// ── Resolution ──────────────────────────────────────────────────────

#[test]
fn resolve_is_idempotent_and_overrides_are_independent() {
    let before = manifest("x:\n  depends_components: [a]\nx/y:\n  depends_components: [b]\n");
    let after = manifest("x:\n  depends_components: [changed]\nx/y:\n  depends_components: [b]\n");

    let r1 = RuleResolver::new(Arc::new(before));
    let first = r1.resolve("x/y/app").unwrap();
    for _ in 0..3 {
        assert_eq!(r1.resolve("x/y/app").unwrap(), first);
    }

    let r2 = RuleResolver::new(Arc::new(after));
    assert_eq!(r2.resolve("x/y/app").unwrap().digest, first.digest);
    assert_ne!(r2.resolve("x/app").unwrap().digest, r1.resolve("x/app").unwrap().digest);
}

#[test]
fn no_rule_defaults_to_supported_targets_only() {
    let resolver = RuleResolver::new(Arc::new(manifest("")));
    let rule = resolver.resolve("anything/here");
    assert!(rule.is_none());
    assert!(eligible(rule.as_deref(), "esp32s3", None, &env()).build_allowed);
    assert!(!eligible(rule.as_deref(), "linux", None, &env()).build_allowed);
}

// ── Merge directives ────────────────────────────────────────────────

#[test]
fn add_then_remove_disjoint_extra_is_identity() {
    let base = manifest("x:\n  depends_components: [a, b]\n");
    let round = Manifest::load(
        &[
            Document::new("1.yml", "x:\n  depends_components: [a, b]\n"),
            Document::new("2.yml", "x:\n  depends_components+: [c, d]\n"),
            Document::new("3.yml", "x:\n  depends_components-: [c, d]\n"),
        ],
        ".",
    )
    .unwrap();
    assert_eq!(base.get("x").unwrap().digest, round.get("x").unwrap().digest);
}

#[test]
fn readding_if_object_replaces() {
    let m = manifest(
        r#"
.base: &base
  disable:
    - if: IDF_TARGET == "esp32"
      reason: first

x:
  <<: *base
  disable+:
    - if: IDF_TARGET == "esp32"
      reason: second
"#,
    );
    let rule = m.get("x").unwrap();
    assert_eq!(rule.disable.len(), 1);
    assert_eq!(rule.disable[0].reason.as_deref(), Some("second"));
}

// ── Dependency decisions ────────────────────────────────────────────

#[test]
fn depends_components_build_and_skip() {
    let m = manifest("app:\n  depends_components: [comp1]\n");
    let rule = m.get("app").map(|r| &**r);
    let app = App::new("app", "esp32", None);

    let hit = DependencyMatcher::new(".", Some(["comp1"]), Some(Vec::<String>::new()));
    assert!(hit.should_build(&app, rule, &env(), None).unwrap().build);

    let miss = DependencyMatcher::new(".", Some(["bar"]), Some(Vec::<String>::new()));
    assert!(!miss.should_build(&app, rule, &env(), None).unwrap().build);
}

// ── Whole pipeline ──────────────────────────────────────────────────

#[test]
fn files_to_classified_apps_in_parallel() {
    let dir = TempDir::new().unwrap();
    for app in ["examples/wifi/scan", "examples/bt/spp", "examples/get_started/hello"] {
        fs::create_dir_all(dir.path().join(app)).unwrap();
    }
    let rules = dir.path().join(".build-test-rules.yml");
    fs::write(
        &rules,
        r#"
examples/wifi:
  enable:
    - if: SOC_WIFI_SUPPORTED == 1
  depends_components: [esp_wifi]

examples/bt:
  disable:
    - if: IDF_TARGET == "esp32s2"
      temporary: true
      reason: no controller yet
  depends_components: [bt]
"#,
    )
    .unwrap();

    let manifest = ManifestLoader::new(dir.path()).check_folders(true).load(&[rules]).unwrap();
    let root = manifest.root().to_string();
    let mut resolver = RuleResolver::new(Arc::new(manifest));

    let mut caps = CapabilityTable::new();
    caps.insert("esp32", "SOC_WIFI_SUPPORTED", 1).insert("esp32s2", "SOC_WIFI_SUPPORTED", 1);
    let env = env().with_capabilities(Arc::new(caps));

    let dirs = ["examples/wifi/scan", "examples/bt/spp", "examples/get_started/hello"];
    let mut apps: Vec<App> = dirs
        .iter()
        .flat_map(|d| ["esp32", "esp32s2", "esp32s3"].map(|t| App::new(*d, t, None)))
        .collect();
    resolver.warm(apps.iter().map(|a| a.app_dir.clone()));

    let matcher = DependencyMatcher::new(&root, Some(["esp_wifi"]), Some(["examples/get_started/hello/main/main.c"]));
    let classifier = Classifier::new(&resolver, &env, &matcher);

    let records: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = apps
            .iter_mut()
            .map(|app| {
                let classifier = &classifier;
                s.spawn(move || classifier.classify(app, None).unwrap())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let status = |dir: &str, target: &str| {
        records
            .iter()
            .find(|r| r.app_dir == dir && r.target == target)
            .map(|r| r.status)
            .unwrap()
    };

    assert_eq!(status("examples/wifi/scan", "esp32"), BuildStatus::ShouldBuild);
    assert_eq!(status("examples/wifi/scan", "esp32s3"), BuildStatus::Disabled);
    assert_eq!(status("examples/bt/spp", "esp32"), BuildStatus::Skipped);
    assert_eq!(status("examples/bt/spp", "esp32s2"), BuildStatus::Disabled);
    assert_eq!(status("examples/get_started/hello", "esp32s3"), BuildStatus::ShouldBuild);

    let bt = records
        .iter()
        .find(|r| r.app_dir == "examples/bt/spp" && r.target == "esp32s2")
        .unwrap();
    assert!(bt.eligibility.temporary);
    assert_eq!(
        bt.reason.as_deref(),
        Some(r#"Disabled by manifest rule: IDF_TARGET == "esp32s2" (temporary) (reason: no controller yet)"#)
    );

    let json = serde_json::to_string(bt).unwrap();
    assert!(json.contains("\"status\":\"disabled\""), "{json}");
}

#[test]
fn variable_env_lookup_is_reentrant() {
    let env = env();
    let a = env.scope("esp32", Some("a"));
    let b = env.scope("esp32s2", Some("b"));
    assert_eq!(a.lookup("IDF_TARGET"), Value::from("esp32"));
    assert_eq!(b.lookup("CONFIG_NAME"), Value::from("b"));
    assert_eq!(a.lookup("CONFIG_NAME"), Value::from("a"));
}
