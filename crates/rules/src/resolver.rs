//! Closest-ancestor rule lookup with a warm-up memo.
//!
//! The memo is filled by [`RuleResolver::warm`] (needs `&mut self`) before
//! parallel evaluation; [`RuleResolver::resolve`] only reads, so a warmed
//! resolver can be shared across threads without locking. Unwarmed
//! folders still resolve correctly by walking ancestors.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::manifest::{path, FolderRule, Manifest};

/// Maps app folders to the rule that governs them.
#[derive(Debug, Clone)]
pub struct RuleResolver {
    manifest: Arc<Manifest>,
    memo: HashMap<String, Option<Arc<FolderRule>>>,
}

impl RuleResolver {
    pub fn new(manifest: Arc<Manifest>) -> Self {
        Self {
            manifest,
            memo: HashMap::new(),
        }
    }

    pub fn manifest(&self) -> &Arc<Manifest> {
        &self.manifest
    }

    /// Rule of `folder` or its nearest ancestor; `None` if no ancestor has one.
    ///
    /// `folder` may be relative (joined with the manifest root) or absolute.
    pub fn resolve(&self, folder: &str) -> Option<Arc<FolderRule>> {
        let key = path::join(self.manifest.root(), folder);
        if let Some(hit) = self.memo.get(&key) {
            return hit.clone();
        }
        self.walk(&key)
    }

    /// Precompute resolutions for `folders`, and for each ancestor visited.
    pub fn warm<I, S>(&mut self, folders: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.memo.len();
        for folder in folders {
            let key = path::join(self.manifest.root(), folder.as_ref());
            self.warm_key(key);
        }
        debug!(added = self.memo.len() - before, total = self.memo.len(), "warmed rule resolver");
    }

    /// Swap in a new manifest; the memo is discarded.
    pub fn reload(&mut self, manifest: Arc<Manifest>) {
        self.manifest = manifest;
        self.memo.clear();
    }

    /// Number of memoized folders.
    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    fn walk(&self, key: &str) -> Option<Arc<FolderRule>> {
        let mut current = key.to_string();
        loop {
            if let Some(rule) = self.manifest.get(&current) {
                return Some(Arc::clone(rule));
            }
            current = path::parent(&current)?;
        }
    }

    // Fills the memo for `key` and every ancestor up to the first hit.
    fn warm_key(&mut self, key: String) -> Option<Arc<FolderRule>> {
        if let Some(hit) = self.memo.get(&key) {
            return hit.clone();
        }
        let resolved = match self.manifest.get(&key) {
            Some(rule) => Some(Arc::clone(rule)),
            None => match path::parent(&key) {
                Some(parent) => self.warm_key(parent),
                None => None,
            },
        };
        self.memo.insert(key, resolved.clone());
        resolved
    }
}
