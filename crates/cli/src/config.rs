use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::debug;

use appgate_core::Config;
use appgate_rules::{Manifest, ManifestLoader};

use crate::cli::ManifestArgs;

/// Command-line flags layered over the environment config.
#[derive(Debug, Clone)]
pub struct ManifestSettings {
    pub root: PathBuf,
    pub files: Vec<PathBuf>,
    pub check_manifest_rules: bool,
}

impl ManifestSettings {
    /// Flags win; unset flags fall back to `config`.
    pub fn resolve(args: &ManifestArgs, config: &Config) -> Self {
        let files = if args.manifest_files.is_empty() {
            config.manifest.files.clone()
        } else {
            args.manifest_files.clone()
        };
        let root = args
            .root
            .clone()
            .unwrap_or_else(|| config.manifest.root_path.clone());
        Self {
            root,
            files,
            check_manifest_rules: args.check_manifest_rules || config.manifest.check_manifest_rules,
        }
    }

    pub fn load(&self) -> Result<Manifest> {
        if self.files.is_empty() {
            bail!("no manifest files given (use --manifest-file or APPGATE_MANIFEST_FILES)");
        }
        debug!(root = %self.root.display(), files = self.files.len(), "loading manifest");
        ManifestLoader::new(self.root.clone())
            .check_folders(self.check_manifest_rules)
            .load(&self.files)
            .context("failed to load manifest")
    }
}

/// Expand `all` into every known target, keeping first-seen order.
pub fn resolve_targets(requested: &[String], config: &Config) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for t in requested {
        let expanded = if t == "all" {
            config.targets.all_targets()
        } else {
            vec![t.clone()]
        };
        for t in expanded {
            if !out.contains(&t) {
                out.push(t);
            }
        }
    }
    out
}
