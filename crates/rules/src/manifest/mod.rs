//! Manifest documents: folder-keyed YAML build/test rules.
//!
//! A document maps folder paths to records:
//!
//! ```yaml
//! .common_disable: &common_disable
//!   - if: IDF_TARGET == "esp32c2"
//!     reason: not enough flash
//!
//! examples/wifi/scan:
//!   enable:
//!     - if: SOC_WIFI_SUPPORTED == 1
//!   disable: *common_disable
//!   depends_components: [esp_wifi]
//! ```
//!
//! Top-level keys starting with `.` hold YAML anchors and are not rules.
//! Documents are applied in order; a later record for the same folder
//! replaces the earlier one (after `+`/`-` directives are resolved).

mod digest;
mod error;
mod loader;
mod merge;
pub mod path;
mod schema;
mod suggest;


use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value as Yaml};
use tracing::{debug, info};

pub use digest::{parse_listing, rule_digest};
pub use error::{ManifestError, Result};
pub use loader::ManifestLoader;
pub use schema::{DependsField, FolderRule, IfClause, Switch, SwitchCase, RULE_KEYS};

use schema::Locator;

/// A named manifest document.
#[derive(Debug, Clone)]
pub struct Document {
    pub name: String,
    pub text: String,
}

impl Document {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }
}

/// Validated rule store, keyed by normalized folder path.
#[derive(Debug, Clone)]
pub struct Manifest {
    root: String,
    rules: IndexMap<String, Arc<FolderRule>>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            rules: IndexMap::new(),
        }
    }
}

impl Manifest {
    /// Parse and validate `documents` in order. Relative folder keys are
    /// joined with `root`.
    pub fn load(documents: &[Document], root: &str) -> Result<Self> {
        let root = path::normalize(root);
        let mut rules: IndexMap<String, Arc<FolderRule>> = IndexMap::new();
        let mut records: HashMap<String, Mapping> = HashMap::new();

        for doc in documents {
            let value = parse_document(doc)?;
            let Some(top) = value else {
                debug!(document = %doc.name, "empty manifest document");
                continue;
            };

            for (key, value) in &top {
                let Some(folder) = key.as_str() else {
                    return Err(ManifestError::invalid(&doc.name, "<top>", "folder keys must be strings"));
                };
                if folder.starts_with('.') && !is_relative_folder(folder) {
                    continue;
                }

                let record = match value {
                    Yaml::Mapping(m) => m.clone(),
                    Yaml::Null => Mapping::new(),
                    _ => {
                        return Err(ManifestError::invalid(
                            &doc.name,
                            folder,
                            "folder rule must be a mapping",
                        ))
                    }
                };

                let folder_key = path::join(&root, folder);
                let merged =
                    merge::apply_directives(&doc.name, folder, &record, records.get(&folder_key))?;
                let loc = Locator {
                    document: &doc.name,
                    folder,
                };
                let mut rule = schema::parse_rule(loc, &folder_key, &merged)?;
                rule.digest = digest::rule_digest(&rule);

                if let Some(prev) = rules.get(&folder_key) {
                    debug!(
                        folder = %folder_key,
                        previous = %prev.document,
                        document = %doc.name,
                        "rule overridden by later document"
                    );
                }
                records.insert(folder_key.clone(), merged);
                rules.insert(folder_key, Arc::new(rule));
            }
        }

        info!(rules = rules.len(), documents = documents.len(), root = %root, "manifest loaded");
        Ok(Self { root, rules })
    }

    /// Normalized root the folder keys are joined with.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Exact-match lookup of an already normalized, root-joined folder.
    pub fn get(&self, folder: &str) -> Option<&Arc<FolderRule>> {
        self.rules.get(folder)
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> impl Iterator<Item = &Arc<FolderRule>> {
        self.rules.values()
    }

    pub fn folders(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// `./examples` and `../x` are folders, not anchor holders.
fn is_relative_folder(key: &str) -> bool {
    key == "." || key == ".." || key.starts_with("./") || key.starts_with("../")
}

fn parse_document(doc: &Document) -> Result<Option<Mapping>> {
    let mut value: Yaml = serde_yaml::from_str(&doc.text).map_err(|e| ManifestError::Yaml {
        document: doc.name.clone(),
        line: e.location().map(|l| l.line()).unwrap_or(0),
        message: e.to_string(),
    })?;
    value.apply_merge().map_err(|e| ManifestError::Yaml {
        document: doc.name.clone(),
        line: e.location().map(|l| l.line()).unwrap_or(0),
        message: e.to_string(),
    })?;

    match value {
        Yaml::Null => Ok(None),
        Yaml::Mapping(m) => Ok(Some(m)),
        _ => Err(ManifestError::invalid(
            &doc.name,
            "<top>",
            "manifest document must be a mapping of folder paths",
        )),
    }
}
