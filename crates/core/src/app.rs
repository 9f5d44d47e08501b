//! App identity and build-system capability interface.
//!
//! An [`App`] is one buildable unit: project directory × target × config name.
//! How an app is detected and built depends on its build system, expressed as
//! an [`AppKind`] looked up by identifier in an [`AppKindRegistry`].

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::status::{BuildState, BuildStatus};

pub const TARGET_PLACEHOLDER: &str = "@t";
pub const WILDCARD_PLACEHOLDER: &str = "@w";
pub const NAME_PLACEHOLDER: &str = "@n";
pub const FULL_NAME_PLACEHOLDER: &str = "@f";
pub const INDEX_PLACEHOLDER: &str = "@i";

// ── App ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct App {
    pub app_dir: String,
    pub target: String,
    #[serde(default)]
    pub config_name: Option<String>,
    pub build_system: String,
    /// Build directory template, relative to `app_dir` unless absolute.
    pub build_dir: String,
    /// 1-based position in the batch, set by the orchestrator.
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub state: BuildState,
}

impl App {
    pub fn new(app_dir: impl Into<String>, target: impl Into<String>, config_name: Option<String>) -> Self {
        Self {
            app_dir: app_dir.into(),
            target: target.into(),
            config_name,
            build_system: "cmake".to_string(),
            build_dir: "build".to_string(),
            index: None,
            state: BuildState::new(),
        }
    }

    pub fn with_build_system(mut self, build_system: impl Into<String>) -> Self {
        self.build_system = build_system.into();
        self
    }

    pub fn with_build_dir(mut self, build_dir: impl Into<String>) -> Self {
        self.build_dir = build_dir.into();
        self
    }

    /// Last path component of the app directory.
    pub fn name(&self) -> &str {
        self.app_dir
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.app_dir)
    }

    pub fn status(&self) -> BuildStatus {
        self.state.status
    }

    /// Expand the `@t`, `@n`, `@f`, `@i` and `@w` placeholders in a path template.
    ///
    /// Without a config name, `@w` is removed together with the one character
    /// before it (usually a `_` or `-` separator).
    pub fn expand(&self, template: &str) -> String {
        let mut path = template.to_string();
        if let Some(index) = self.index {
            path = path.replace(INDEX_PLACEHOLDER, &index.to_string());
        }
        path = path.replace(TARGET_PLACEHOLDER, &self.target);
        path = path.replace(NAME_PLACEHOLDER, self.name());
        path = path.replace(FULL_NAME_PLACEHOLDER, &self.app_dir.replace('/', "_"));

        if let Some(pos) = path.find(WILDCARD_PLACEHOLDER) {
            match &self.config_name {
                Some(config) => path = path.replace(WILDCARD_PLACEHOLDER, config),
                None => {
                    let left = path[..pos]
                        .char_indices()
                        .last()
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    path.replace_range(left..pos + WILDCARD_PLACEHOLDER.len(), "");
                }
            }
        }
        path
    }

    /// Expanded build directory, joined to `app_dir` when relative.
    pub fn build_path(&self) -> String {
        let dir = self.expand(&self.build_dir);
        if dir.starts_with('/') {
            dir
        } else {
            format!("{}/{}", self.app_dir.trim_end_matches('/'), dir)
        }
    }
}

impl PartialEq for App {
    fn eq(&self, other: &Self) -> bool {
        self.app_dir == other.app_dir
            && self.target == other.target
            && self.config_name == other.config_name
    }
}

impl Eq for App {}

impl PartialOrd for App {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for App {
    fn cmp(&self, other: &Self) -> Ordering {
        self.app_dir
            .cmp(&other.app_dir)
            .then_with(|| self.target.cmp(&other.target))
            .then_with(|| self.config_name.cmp(&other.config_name))
    }
}

impl fmt::Display for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}) App {}, target {}, config {}",
            self.build_system,
            self.app_dir,
            self.target,
            self.config_name.as_deref().unwrap_or("(default)")
        )
    }
}

// ── Build execution seam ────────────────────────────────────────────

/// A native build-system invocation, prepared but not executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Result of running a [`BuildCommand`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub exit_code: i32,
    /// Unignored warnings were found in the build log.
    pub has_warnings: bool,
}

/// Executes build commands. Implemented by the orchestrator (subprocesses,
/// remote workers, dry runs).
pub trait BuildRunner: Send + Sync {
    fn run(&self, command: &BuildCommand) -> Result<BuildOutcome>;
}

// ── AppKind ─────────────────────────────────────────────────────────

/// Capability interface of one build system.
pub trait AppKind: Send + Sync {
    /// Registry key, e.g. `"cmake"`.
    fn build_system(&self) -> &'static str;

    /// Whether `path` holds a project of this build system.
    fn is_app(&self, path: &Path) -> bool;

    /// Prepare the native invocation for `app`.
    fn pre_build(&self, app: &App) -> Result<BuildCommand>;

    /// Run the prepared command through `runner`.
    fn build(&self, app: &App, runner: &dyn BuildRunner) -> Result<BuildOutcome> {
        let command = self.pre_build(app)?;
        tracing::info!(app = %app, command = %command.args.join(" "), "running {}", command.program);
        runner.run(&command)
    }

    /// Record the outcome on the app's build state.
    fn post_build(&self, app: &mut App, outcome: &BuildOutcome, check_warnings: bool) -> Result<()> {
        let (status, reason) = if outcome.exit_code != 0 {
            (
                BuildStatus::BuildFailed,
                Some(format!("Build failed with exit code {}", outcome.exit_code)),
            )
        } else if check_warnings && outcome.has_warnings {
            (
                BuildStatus::BuildFailed,
                Some("Build succeeded with warnings".to_string()),
            )
        } else {
            (BuildStatus::BuildSuccess, None)
        };
        app.state.transition(status, reason)
    }
}

/// CMake-based projects (`idf.py` front-end).
#[derive(Debug, Default, Clone, Copy)]
pub struct CMakeAppKind;

impl CMakeAppKind {
    const PROJECT_LINE: &'static str = "include($ENV{IDF_PATH}/tools/cmake/project.cmake)";
}

impl AppKind for CMakeAppKind {
    fn build_system(&self) -> &'static str {
        "cmake"
    }

    fn is_app(&self, path: &Path) -> bool {
        fs::read_to_string(path.join("CMakeLists.txt"))
            .map(|content| content.contains(Self::PROJECT_LINE))
            .unwrap_or(false)
    }

    fn pre_build(&self, app: &App) -> Result<BuildCommand> {
        Ok(BuildCommand {
            program: "idf.py".to_string(),
            args: vec![
                "-B".to_string(),
                app.build_path(),
                "-C".to_string(),
                app.app_dir.clone(),
                format!("-DIDF_TARGET={}", app.target),
                "build".to_string(),
            ],
            env: vec![("IDF_TARGET".to_string(), app.target.clone())],
        })
    }
}

/// Legacy GNU Make projects.
#[derive(Debug, Default, Clone, Copy)]
pub struct MakeAppKind;

impl MakeAppKind {
    const PROJECT_LINE: &'static str = "$(IDF_PATH)/make/project.mk";
}

impl AppKind for MakeAppKind {
    fn build_system(&self) -> &'static str {
        "make"
    }

    fn is_app(&self, path: &Path) -> bool {
        fs::read_to_string(path.join("Makefile"))
            .map(|content| content.contains(Self::PROJECT_LINE))
            .unwrap_or(false)
    }

    fn pre_build(&self, app: &App) -> Result<BuildCommand> {
        Ok(BuildCommand {
            program: "make".to_string(),
            args: vec![
                "-C".to_string(),
                app.app_dir.clone(),
                format!("BUILD_DIR_BASE={}", app.build_path()),
                format!("IDF_TARGET={}", app.target),
                "all".to_string(),
            ],
            env: vec![("IDF_TARGET".to_string(), app.target.clone())],
        })
    }
}

// ── Registry ────────────────────────────────────────────────────────

/// Build systems keyed by identifier.
pub struct AppKindRegistry {
    kinds: BTreeMap<String, Arc<dyn AppKind>>,
}

impl AppKindRegistry {
    pub fn new() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }

    /// Registry holding the built-in `cmake` and `make` kinds.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.kinds.insert("cmake".to_string(), Arc::new(CMakeAppKind));
        registry.kinds.insert("make".to_string(), Arc::new(MakeAppKind));
        registry
    }

    /// Register a kind. Returns error if its identifier is already registered.
    pub fn register(&mut self, kind: impl AppKind + 'static) -> Result<()> {
        let name = kind.build_system();
        if self.kinds.contains_key(name) {
            return Err(CoreError::DuplicateBuildSystem(name.to_string()));
        }
        self.kinds.insert(name.to_string(), Arc::new(kind));
        Ok(())
    }

    pub fn get(&self, build_system: &str) -> Result<Arc<dyn AppKind>> {
        self.kinds
            .get(build_system)
            .cloned()
            .ok_or_else(|| CoreError::UnknownBuildSystem(build_system.to_string()))
    }

    /// First kind (in identifier order) that recognises `path`.
    pub fn detect(&self, path: &Path) -> Option<Arc<dyn AppKind>> {
        self.kinds.values().find(|k| k.is_app(path)).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.kinds.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl Default for AppKindRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRunner(i32, bool);

    impl BuildRunner for FixedRunner {
        fn run(&self, _command: &BuildCommand) -> Result<BuildOutcome> {
            Ok(BuildOutcome {
                exit_code: self.0,
                has_warnings: self.1,
            })
        }
    }

    fn should_build_app() -> App {
        let mut app = App::new("examples/hello", "esp32", None);
        app.state.transition(BuildStatus::ShouldBuild, None).unwrap();
        app
    }

    #[test]
    fn expand_placeholders() {
        let mut app = App::new("examples/get-started/hello", "esp32s3", Some("psram".into()));
        app.index = Some(7);
        assert_eq!(app.expand("build_@t_@w"), "build_esp32s3_psram");
        assert_eq!(app.expand("@n-@i"), "hello-7");
        assert_eq!(app.expand("@f"), "examples_get-started_hello");
    }

    #[test]
    fn expand_drops_wildcard_and_separator_without_config() {
        let app = App::new("a/b", "esp32", None);
        assert_eq!(app.expand("build_@t_@w"), "build_esp32");
    }

    #[test]
    fn build_path_relative_and_absolute() {
        let app = App::new("a/b/", "esp32", None).with_build_dir("build_@t");
        assert_eq!(app.build_path(), "a/b/build_esp32");
        let app = app.with_build_dir("/tmp/out");
        assert_eq!(app.build_path(), "/tmp/out");
    }

    #[test]
    fn apps_sort_by_dir_target_config() {
        let mut apps = vec![
            App::new("b", "esp32", None),
            App::new("a", "esp32s2", None),
            App::new("a", "esp32", Some("z".into())),
            App::new("a", "esp32", None),
        ];
        apps.sort();
        let keys: Vec<_> = apps
            .iter()
            .map(|a| format!("{}:{}:{}", a.app_dir, a.target, a.config_name.as_deref().unwrap_or("")))
            .collect();
        assert_eq!(keys, vec!["a:esp32:", "a:esp32:z", "a:esp32s2:", "b:esp32:"]);
    }

    #[test]
    fn registry_builtins_and_duplicates() {
        let mut registry = AppKindRegistry::with_builtins();
        assert_eq!(registry.names(), vec!["cmake", "make"]);
        assert!(registry.get("cmake").is_ok());
        assert!(matches!(registry.get("bazel"), Err(CoreError::UnknownBuildSystem(_))));
        assert!(registry.register(CMakeAppKind).is_err());
    }

    #[test]
    fn detect_cmake_project() {
        let dir = tempfile::TempDir::new().expect("create tempdir");
        fs::write(
            dir.path().join("CMakeLists.txt"),
            "cmake_minimum_required(VERSION 3.16)\ninclude($ENV{IDF_PATH}/tools/cmake/project.cmake)\nproject(hello)\n",
        )
        .unwrap();
        let registry = AppKindRegistry::with_builtins();
        let kind = registry.detect(dir.path()).unwrap();
        assert_eq!(kind.build_system(), "cmake");
        assert!(registry.detect(&dir.path().join("missing")).is_none());
    }

    #[test]
    fn cmake_pre_build_command() {
        let app = App::new("apps/blink", "esp32c3", None);
        let cmd = CMakeAppKind.pre_build(&app).unwrap();
        assert_eq!(cmd.program, "idf.py");
        assert!(cmd.args.contains(&"-DIDF_TARGET=esp32c3".to_string()));
        assert_eq!(cmd.args.last().map(String::as_str), Some("build"));
    }

    #[test]
    fn post_build_records_outcome() {
        let kind = CMakeAppKind;

        let mut ok = should_build_app();
        let outcome = kind.build(&ok, &FixedRunner(0, false)).unwrap();
        kind.post_build(&mut ok, &outcome, true).unwrap();
        assert_eq!(ok.status(), BuildStatus::BuildSuccess);

        let mut failed = should_build_app();
        let outcome = kind.build(&failed, &FixedRunner(2, false)).unwrap();
        kind.post_build(&mut failed, &outcome, false).unwrap();
        assert_eq!(failed.status(), BuildStatus::BuildFailed);
        assert_eq!(failed.state.reason.as_deref(), Some("Build failed with exit code 2"));

        let mut warned = should_build_app();
        let outcome = kind.build(&warned, &FixedRunner(0, true)).unwrap();
        kind.post_build(&mut warned, &outcome, true).unwrap();
        assert_eq!(warned.status(), BuildStatus::BuildFailed);
    }
}
