//! Content digests of folder rules, for detecting which rules changed
//! between two revisions of the manifest files.

use std::collections::{BTreeMap, BTreeSet};

use sha2::{Digest, Sha256};

use super::path;
use super::schema::FolderRule;
use super::Manifest;

/// Hex SHA-256 over the canonical JSON form of `rule`.
pub fn rule_digest(rule: &FolderRule) -> String {
    // Serializing plain data to a String can't fail.
    let canonical = serde_json::to_string(rule).unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    format!("{digest:x}")
}

/// Parse a `folder:digest` listing. Malformed lines are skipped.
pub fn parse_listing(text: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match line.rsplit_once(':') {
            Some((folder, digest)) if !folder.is_empty() && !digest.is_empty() => {
                out.insert(folder.trim().to_string(), digest.trim().to_string());
            }
            _ => tracing::warn!(line = lineno + 1, content = line, "skipping malformed digest line"),
        }
    }
    out
}

impl Manifest {
    /// One `folder:digest` line per rule, sorted by folder. Folders are
    /// written relative to the manifest root.
    pub fn dump_sha(&self) -> String {
        let mut lines: Vec<String> = self
            .rules()
            .map(|rule| format!("{}:{}", path::relative_to(self.root(), &rule.folder), rule.digest))
            .collect();
        lines.sort();
        let mut out = lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    /// Folders (joined with the root) whose rule was added, removed or
    /// changed relative to a previous [`dump_sha`](Self::dump_sha) listing.
    pub fn diff_sha(&self, previous: &str) -> BTreeSet<String> {
        let previous: BTreeMap<String, String> = parse_listing(previous)
            .into_iter()
            .map(|(folder, digest)| (path::join(self.root(), &folder), digest))
            .collect();

        let mut changed = BTreeSet::new();
        for rule in self.rules() {
            match previous.get(&rule.folder) {
                Some(digest) if *digest == rule.digest => {}
                _ => {
                    changed.insert(rule.folder.clone());
                }
            }
        }
        for folder in previous.keys() {
            if self.get(folder).is_none() {
                changed.insert(folder.clone());
            }
        }

        tracing::debug!(changed = changed.len(), "compared manifest digests");
        changed
    }
}
