use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use appgate_core::batch::{active_batch, shard};
use appgate_core::{App, AppKindRegistry, Config, InclusionFlags};
use appgate_rules::manifest::path;
use appgate_rules::{
    AppRecord, CapabilitySource, CapabilityTable, Classifier, DependencyMatcher, Environment, NoCapabilities,
    RuleResolver,
};

use crate::cli::{parse_app_spec, CheckArgs, DiffShaArgs, DumpShaArgs};
use crate::config::{resolve_targets, ManifestSettings};

type AppKey = (String, String, Option<String>);

fn key(app_dir: &str, target: &str, config_name: Option<&str>) -> AppKey {
    (app_dir.to_string(), target.to_string(), config_name.map(str::to_string))
}

/// One line of `check` output.
#[derive(Serialize)]
struct CheckLine<'a> {
    /// 1-based position in the selected batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
    #[serde(flatten)]
    record: &'a AppRecord,
}

// ── check ───────────────────────────────────────────────────────────

pub fn check(args: &CheckArgs, config: &Config) -> Result<()> {
    let settings = ManifestSettings::resolve(&args.manifest, config);
    let manifest = Arc::new(settings.load()?);
    let root = manifest.root().to_string();

    let env = environment(args.capabilities.as_deref(), config)?;
    let targets = resolve_targets(&args.targets, config);
    let mut apps = collect_apps(&args.apps, &targets, &settings.root, args.detect);
    info!(apps = apps.len(), targets = targets.len(), rules = manifest.len(), "checking apps");

    let mut resolver = RuleResolver::new(Arc::clone(&manifest));
    resolver.warm(apps.iter().map(|a| a.app_dir.clone()));

    let mut matcher = DependencyMatcher::new(&root, args.modified_components.clone(), args.modified_files.clone())
        .with_deactivation(
            &config.dependencies.deactivate_by_components,
            &config.dependencies.deactivate_by_filepatterns,
        )
        .context("invalid deactivation file pattern")?;
    if let Some(previous) = &args.previous_sha {
        let text = fs::read_to_string(previous)
            .with_context(|| format!("failed to read digest listing {}", previous.display()))?;
        let changed = manifest.diff_sha(&text);
        info!(changed = changed.len(), "rule folders changed since previous listing");
        matcher = matcher.with_modified_rule_folders(changed);
    }
    if let Some(reason) = matcher.deactivated() {
        info!(reason, "dependency-driven build deactivated");
    }

    let classifier = Classifier::new(&resolver, &env, &matcher);
    let records: Vec<AppRecord> = apps
        .par_iter_mut()
        .map(|app| classifier.classify(app, None))
        .collect::<appgate_core::Result<_>>()
        .context("failed to classify apps")?;
    log_counts(&records);

    let mut by_app: HashMap<AppKey, AppRecord> = records
        .into_iter()
        .map(|r| (key(&r.app_dir, &r.target, r.config_name.as_deref()), r))
        .collect();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if args.all {
        let mut all: Vec<&AppRecord> = by_app.values().collect();
        all.sort_by(|a, b| (&a.app_dir, &a.target, &a.config_name).cmp(&(&b.app_dir, &b.target, &b.config_name)));
        for record in all {
            write_line(&mut out, None, record)?;
        }
        return Ok(());
    }

    let flags = InclusionFlags {
        include_disabled: args.include_disabled,
        include_skipped: args.include_skipped,
    };
    apps.sort();
    let active = active_batch(apps, flags)?;
    let selected = shard(active, args.parallel_count, args.parallel_index)?;
    info!(selected = selected.len(), "selected apps for this job");

    for app in &selected {
        if let Some(record) = by_app.remove(&key(&app.app_dir, &app.target, app.config_name.as_deref())) {
            write_line(&mut out, app.index, &record)?;
        }
    }
    Ok(())
}

fn write_line(out: &mut impl Write, index: Option<usize>, record: &AppRecord) -> Result<()> {
    let line = serde_json::to_string(&CheckLine { index, record })?;
    writeln!(out, "{}", line)?;
    Ok(())
}

fn environment(capabilities: Option<&Path>, config: &Config) -> Result<Environment> {
    let source: Arc<dyn CapabilitySource> = match capabilities {
        Some(file) => {
            let text = fs::read_to_string(file)
                .with_context(|| format!("failed to read capability table {}", file.display()))?;
            let table = CapabilityTable::from_yaml(&text)
                .with_context(|| format!("invalid capability table {}", file.display()))?;
            info!(targets = table.targets().count(), "loaded capability table");
            Arc::new(table)
        }
        None => Arc::new(NoCapabilities),
    };
    Ok(
        Environment::new(config.framework.version, config.targets.default_build_targets.clone())
            .with_capabilities(source)
            .with_os_variables(std::env::vars_os()),
    )
}

/// Every `folder[:config]` × target pair. With `detect`, folders no
/// registered build system recognises are dropped.
fn collect_apps(specs: &[String], targets: &[String], root: &Path, detect: bool) -> Vec<App> {
    let registry = AppKindRegistry::with_builtins();
    let mut apps = Vec::new();
    for spec in specs {
        let (folder, config_name) = parse_app_spec(spec);
        let build_system = if detect {
            match registry.detect(&root.join(&folder)) {
                Some(kind) => Some(kind.build_system()),
                None => {
                    warn!(folder = %folder, known = ?registry.names(), "no build system detected, skipping");
                    continue;
                }
            }
        } else {
            None
        };
        for target in targets {
            let app = App::new(folder.clone(), target.clone(), config_name.clone());
            apps.push(match build_system {
                Some(bs) => app.with_build_system(bs),
                None => app,
            });
        }
    }
    apps
}

fn log_counts(records: &[AppRecord]) {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for r in records {
        *counts.entry(r.status.as_str()).or_default() += 1;
    }
    for (status, count) in counts {
        info!(status, count, "classified");
    }
}

// ── dump-sha / diff-sha ─────────────────────────────────────────────

pub fn dump_sha(args: &DumpShaArgs, config: &Config) -> Result<()> {
    let manifest = ManifestSettings::resolve(&args.manifest, config).load()?;
    let listing = manifest.dump_sha();
    match &args.output {
        Some(path) => {
            fs::write(path, &listing).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), rules = manifest.len(), "wrote digest listing");
        }
        None => io::stdout().lock().write_all(listing.as_bytes())?,
    }
    Ok(())
}

pub fn diff_sha(args: &DiffShaArgs, config: &Config) -> Result<()> {
    let manifest = ManifestSettings::resolve(&args.manifest, config).load()?;
    let previous = fs::read_to_string(&args.previous)
        .with_context(|| format!("failed to read digest listing {}", args.previous.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for folder in manifest.diff_sha(&previous) {
        writeln!(out, "{}", path::relative_to(manifest.root(), &folder))?;
    }
    Ok(())
}
