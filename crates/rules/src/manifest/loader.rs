//! Filesystem-backed manifest loading.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::error::{ManifestError, Result};
use super::{Document, Manifest};

/// Reads manifest files from disk and builds a [`Manifest`].
#[derive(Debug, Clone)]
pub struct ManifestLoader {
    /// Directory relative folder keys are resolved against.
    root: PathBuf,
    /// Fail (instead of warn) when a rule names a missing folder.
    check_folders: bool,
}

impl ManifestLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            check_folders: false,
        }
    }

    pub fn check_folders(mut self, strict: bool) -> Self {
        self.check_folders = strict;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read `files` in order and load them as one manifest.
    pub fn load(&self, files: &[PathBuf]) -> Result<Manifest> {
        let mut documents = Vec::with_capacity(files.len());
        for file in files {
            let text = fs::read_to_string(file).map_err(|source| ManifestError::Io {
                path: file.display().to_string(),
                source,
            })?;
            info!(path = %file.display(), bytes = text.len(), "read manifest file");
            documents.push(Document::new(file.display().to_string(), text));
        }

        let manifest = Manifest::load(&documents, &self.root.to_string_lossy())?;
        self.check_rule_folders(&manifest)?;
        Ok(manifest)
    }

    /// Warn about (or reject) rules whose folder does not exist.
    fn check_rule_folders(&self, manifest: &Manifest) -> Result<()> {
        for rule in manifest.rules() {
            if Path::new(&rule.folder).is_dir() {
                continue;
            }
            if self.check_folders {
                return Err(ManifestError::MissingFolder {
                    document: rule.document.clone(),
                    folder: rule.folder.clone(),
                });
            }
            warn!(folder = %rule.folder, document = %rule.document, "manifest rule names a folder that does not exist");
        }
        Ok(())
    }
}
