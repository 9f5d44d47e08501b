use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    profiled_env_opt(profile, key)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn profiled_env_list(profile: &str, key: &str) -> Option<Vec<String>> {
    profiled_env_opt(profile, key).map(|v| split_list(&v))
}

/// Split a semicolon-separated list, trimming blanks. Commas are accepted too.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split([';', ','])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Officially supported targets: enabled by default when no rule says otherwise.
pub const SUPPORTED_TARGETS: &[&str] = &[
    "esp32", "esp32s2", "esp32c3", "esp32s3", "esp32c2", "esp32c6", "esp32h2", "esp32p4",
];

/// Preview targets: only built when a rule explicitly enables them.
pub const PREVIEW_TARGETS: &[&str] = &["esp32c5", "esp32c61", "linux"];

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub manifest: ManifestConfig,
    pub targets: TargetConfig,
    pub framework: FrameworkConfig,
    pub dependencies: DependencyConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `APPGATE_PROFILE` env var. When set (e.g. `CI`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("APPGATE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            manifest: ManifestConfig::from_env_profiled(p),
            targets: TargetConfig::from_env_profiled(p),
            framework: FrameworkConfig::from_env_profiled(p),
            dependencies: DependencyConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  manifest:    root={}, files={}, strict={}",
            self.manifest.root_path.display(),
            self.manifest.files.len(),
            self.manifest.check_manifest_rules
        );
        tracing::info!(
            "  targets:     default={}, preview={}",
            self.targets.default_build_targets.join(","),
            self.targets.preview_targets.join(",")
        );
        tracing::info!("  framework:   version={}", self.framework.version);
        tracing::info!(
            "  deps:        deactivate_components={}, deactivate_filepatterns={}",
            self.dependencies.deactivate_by_components.len(),
            self.dependencies.deactivate_by_filepatterns.len()
        );
    }
}

// ── Manifest ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    /// Root that relative folder keys in manifest files are resolved against.
    pub root_path: PathBuf,
    pub files: Vec<PathBuf>,
    /// Fail (instead of warn) when a declared folder does not exist.
    pub check_manifest_rules: bool,
}

impl ManifestConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            root_path: PathBuf::from(profiled_env_or(p, "APPGATE_MANIFEST_ROOT", ".")),
            files: profiled_env_list(p, "APPGATE_MANIFEST_FILES")
                .unwrap_or_default()
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            check_manifest_rules: profiled_env_bool(p, "APPGATE_CHECK_MANIFEST_RULES", false),
        }
    }
}

// ── Targets ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub default_build_targets: Vec<String>,
    pub preview_targets: Vec<String>,
}

impl TargetConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            default_build_targets: profiled_env_list(p, "APPGATE_DEFAULT_BUILD_TARGETS")
                .unwrap_or_else(|| SUPPORTED_TARGETS.iter().map(|t| t.to_string()).collect()),
            preview_targets: profiled_env_list(p, "APPGATE_PREVIEW_TARGETS")
                .unwrap_or_else(|| PREVIEW_TARGETS.iter().map(|t| t.to_string()).collect()),
        }
    }

    /// Every known target, supported ones first.
    pub fn all_targets(&self) -> Vec<String> {
        let mut all = self.default_build_targets.clone();
        for t in &self.preview_targets {
            if !all.contains(t) {
                all.push(t.clone());
            }
        }
        all
    }
}

// ── Framework ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameworkConfig {
    pub version: Version,
}

impl FrameworkConfig {
    fn from_env_profiled(p: &str) -> Self {
        let raw = profiled_env_or(p, "APPGATE_FRAMEWORK_VERSION", "5.3.0");
        let version = match raw.parse() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(value = %raw, error = %e, "invalid framework version, using 0.0.0");
                Version::default()
            }
        };
        Self { version }
    }
}

// ── Dependency-driven build ───────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyConfig {
    /// Modified components that switch dependency-driven build off.
    pub deactivate_by_components: Vec<String>,
    /// Modified-file globs that switch dependency-driven build off.
    pub deactivate_by_filepatterns: Vec<String>,
}

impl DependencyConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            deactivate_by_components: profiled_env_list(p, "APPGATE_DEACTIVATE_COMPONENTS")
                .unwrap_or_default(),
            deactivate_by_filepatterns: profiled_env_list(p, "APPGATE_DEACTIVATE_FILEPATTERNS")
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_accepts_semicolons_and_commas() {
        assert_eq!(split_list("a; b;;c,d "), vec!["a", "b", "c", "d"]);
        assert!(split_list("  ").is_empty());
    }

    #[test]
    fn all_targets_appends_preview_without_duplicates() {
        let cfg = TargetConfig {
            default_build_targets: vec!["esp32".into(), "esp32s2".into()],
            preview_targets: vec!["esp32s2".into(), "esp32c5".into()],
        };
        assert_eq!(cfg.all_targets(), vec!["esp32", "esp32s2", "esp32c5"]);
    }

    #[test]
    fn profile_label_defaults() {
        let mut cfg = Config::for_profile("");
        assert_eq!(cfg.profile_label(), "default");
        cfg.profile = "CI".into();
        assert_eq!(cfg.profile_label(), "CI");
    }
}
