//! Dependency-driven build decisions.
//!
//! Given the components and files modified by a change, decide whether an
//! eligible app needs rebuilding. Checks run in a fixed order and the first
//! that fires decides:
//!
//! 1. no modified sets supplied: dependency-driven build is off, build
//! 2. a deactivation component or file glob matches: build everything
//! 3. the app's governing manifest rule changed: build
//! 4. a modified non-documentation file is under the app directory: build
//! 5. `depends_components` intersects the modified components: build
//! 6. `depends_filepatterns` matches a modified file: build
//! 7. neither field declared: use the build-system-reported dependencies,
//!    building when none were reported
//! 8. otherwise skip
//!
//! Paths are compared relative to the manifest root.

use std::collections::BTreeSet;

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use tracing::debug;

use appgate_core::App;

use crate::env::Environment;
use crate::expr::ExprError;
use crate::manifest::{path, FolderRule};

/// File extensions whose changes never trigger a build on their own.
pub const DOC_EXTENSIONS: &[&str] = &["md", "rst"];

/// Compile a dependency glob. `*` stays within one path segment; `**` recurses.
pub fn compile_glob(pattern: &str) -> Result<Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

/// Compile `patterns` into one matcher.
pub fn glob_set<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(compile_glob(pattern.as_ref())?);
    }
    builder.build()
}

/// Verdict of [`DependencyMatcher::should_build`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildDecision {
    pub build: bool,
    pub reason: String,
}

impl BuildDecision {
    fn build(reason: impl Into<String>) -> Self {
        Self {
            build: true,
            reason: reason.into(),
        }
    }

    fn skip(reason: impl Into<String>) -> Self {
        Self {
            build: false,
            reason: reason.into(),
        }
    }
}

/// Immutable view of one change, shared by every app decision.
#[derive(Debug, Clone)]
pub struct DependencyMatcher {
    root: String,
    components: Option<BTreeSet<String>>,
    files: Option<Vec<String>>,
    /// Set when a deactivation entry matched; forces every app to build.
    deactivated: Option<String>,
    modified_rule_folders: BTreeSet<String>,
    doc_extensions: Vec<String>,
}

impl DependencyMatcher {
    /// `components`/`files` are `None` when the caller did not supply them;
    /// with both `None` dependency-driven build is inactive.
    pub fn new<C, F>(root: &str, components: Option<C>, files: Option<F>) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        let root = path::normalize(root);
        let components = components.map(|c| c.into_iter().map(Into::into).collect());
        let files = files.map(|f| {
            f.into_iter()
                .map(|p| path::relative_to(&root, &path::join(&root, p.as_ref())))
                .collect()
        });
        Self {
            root,
            components,
            files,
            deactivated: None,
            modified_rule_folders: BTreeSet::new(),
            doc_extensions: DOC_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Force building every app when a modified component is in
    /// `components` or a modified file matches one of `patterns`.
    pub fn with_deactivation<S: AsRef<str>>(mut self, components: &[S], patterns: &[S]) -> Result<Self, globset::Error> {
        if let Some(modified) = &self.components {
            let hits: Vec<&str> = components
                .iter()
                .map(|c| c.as_ref())
                .filter(|c| modified.contains(*c))
                .collect();
            if !hits.is_empty() {
                self.deactivated = Some(format!(
                    "Build all apps since modified components {} match the deactivation list",
                    hits.join(", ")
                ));
                return Ok(self);
            }
        }

        if !patterns.is_empty() {
            let set = glob_set(patterns)?;
            if let Some(files) = &self.files {
                let hits: Vec<&str> = files.iter().filter(|f| set.is_match(f)).map(String::as_str).collect();
                if !hits.is_empty() {
                    self.deactivated = Some(format!(
                        "Build all apps since modified files {} match the deactivation file patterns",
                        hits.join(", ")
                    ));
                }
            }
        }
        Ok(self)
    }

    /// Rule folders (root-joined) whose digest changed; apps they govern build.
    pub fn with_modified_rule_folders(mut self, folders: impl IntoIterator<Item = String>) -> Self {
        self.modified_rule_folders = folders.into_iter().collect();
        self
    }

    pub fn with_doc_extensions(mut self, extensions: &[&str]) -> Self {
        self.doc_extensions = extensions.iter().map(|e| e.trim_start_matches('.').to_string()).collect();
        self
    }

    /// Dependency-driven build is on: at least one modified set was supplied.
    pub fn is_active(&self) -> bool {
        self.components.is_some() || self.files.is_some()
    }

    /// Reason every app builds regardless of dependencies, if a
    /// deactivation entry matched.
    pub fn deactivated(&self) -> Option<&str> {
        self.deactivated.as_deref()
    }

    /// Decide whether `app` must build.
    ///
    /// `reported` is the build system's own dependency list for the app,
    /// consulted only when the rule declares no dependency fields. Fails only
    /// when a switch condition cannot be evaluated.
    pub fn should_build(
        &self,
        app: &App,
        rule: Option<&FolderRule>,
        env: &Environment,
        reported: Option<&[String]>,
    ) -> Result<BuildDecision, ExprError> {
        let decision = self.decide(app, rule, env, reported)?;
        debug!(app = %app, build = decision.build, reason = %decision.reason, "dependency decision");
        Ok(decision)
    }

    fn decide(
        &self,
        app: &App,
        rule: Option<&FolderRule>,
        env: &Environment,
        reported: Option<&[String]>,
    ) -> Result<BuildDecision, ExprError> {
        if !self.is_active() {
            return Ok(BuildDecision::build("Dependency-driven build is not active"));
        }
        if let Some(reason) = &self.deactivated {
            return Ok(BuildDecision::build(reason.clone()));
        }

        let full_dir = path::join(&self.root, &app.app_dir);
        // The governing rule changed, or a closer rule was removed.
        let governing = rule.map(|r| r.folder.as_str());
        if let Some(folder) = self.modified_rule_folders.iter().find(|f| {
            path::is_within(f, &full_dir) && governing.map_or(true, |g| path::is_within(g, f))
        }) {
            return Ok(BuildDecision::build(format!("Manifest rule for {} was modified", folder)));
        }

        let app_dir = path::relative_to(&self.root, &full_dir);
        let files = self.files.as_deref().unwrap_or_default();
        if let Some(file) = files
            .iter()
            .find(|f| path::is_within(&app_dir, f) && !self.is_doc(f))
        {
            return Ok(BuildDecision::build(format!("Modified file {} is under the app directory", file)));
        }

        let scope = env.scope(&app.target, app.config_name.as_deref());
        let empty = BTreeSet::new();
        let modified = self.components.as_ref().unwrap_or(&empty);

        let mut declared_components: &[String] = &[];
        let mut declared_patterns: &[String] = &[];

        if let Some(field) = rule.and_then(|r| r.depends_components.as_ref()) {
            declared_components = field.resolve(&scope)?;
            let hits: Vec<&str> = declared_components
                .iter()
                .filter(|c| modified.contains(*c))
                .map(String::as_str)
                .collect();
            if !hits.is_empty() {
                return Ok(BuildDecision::build(format!(
                    "Depends on modified components {}",
                    hits.join(", ")
                )));
            }
        }

        if let Some(field) = rule.and_then(|r| r.depends_filepatterns.as_ref()) {
            declared_patterns = field.resolve(&scope)?;
            // Validated at load; hand-built rules may still be malformed.
            match glob_set(declared_patterns) {
                Ok(set) => {
                    if let Some(file) = files.iter().find(|f| set.is_match(f)) {
                        return Ok(BuildDecision::build(format!(
                            "Modified file {} matches depends_filepatterns",
                            file
                        )));
                    }
                }
                Err(e) => tracing::warn!(app = %app, error = %e, "invalid depends_filepatterns"),
            }
        }

        if !rule.is_some_and(FolderRule::has_dependencies) {
            return Ok(match reported {
                None => BuildDecision::build("No dependency information available"),
                Some(deps) => {
                    let hits: Vec<&str> = deps
                        .iter()
                        .filter(|c| modified.contains(*c))
                        .map(String::as_str)
                        .collect();
                    if hits.is_empty() {
                        BuildDecision::skip(format!(
                            "Modified components [{}] do not intersect build-system dependencies [{}]",
                            join(modified.iter()),
                            join(deps.iter())
                        ))
                    } else {
                        BuildDecision::build(format!(
                            "Build-system dependencies include modified components {}",
                            hits.join(", ")
                        ))
                    }
                }
            });
        }

        Ok(BuildDecision::skip(format!(
            "Modified components [{}] do not intersect depends_components [{}]; \
             modified files [{}] do not match depends_filepatterns [{}]",
            join(modified.iter()),
            join(declared_components.iter()),
            join(files.iter()),
            join(declared_patterns.iter()),
        )))
    }

    fn is_doc(&self, file: &str) -> bool {
        let name = file.rsplit('/').next().unwrap_or(file);
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => self.doc_extensions.iter().any(|d| d.eq_ignore_ascii_case(ext)),
            _ => false,
        }
    }
}

fn join<'a>(items: impl Iterator<Item = &'a String>) -> String {
    items.map(String::as_str).collect::<Vec<_>>().join(", ")
}
