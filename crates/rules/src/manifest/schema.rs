//! Typed folder rules and their conversion from YAML values.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value as Yaml};

use super::error::{ManifestError, Result};
use super::suggest::unknown_key_message;
use crate::expr::{self, Expression, Lookup};

/// Keys accepted in a folder record. Each also accepts `+`/`-` suffixes.
pub const RULE_KEYS: &[&str] = &[
    "enable",
    "disable",
    "disable_test",
    "depends_components",
    "depends_filepatterns",
];

const CLAUSE_KEYS: &[&str] = &["if", "temporary", "reason"];
const SWITCH_KEYS: &[&str] = &["if", "content", "default"];

// ── Types ───────────────────────────────────────────────────────────

/// One `enable`/`disable`/`disable_test` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IfClause {
    #[serde(rename = "if")]
    pub expr: Expression,
    pub temporary: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// One `if` arm of a dependency switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchCase {
    #[serde(rename = "if")]
    pub expr: Expression,
    pub content: Vec<String>,
}

/// Ordered cases; the first true case wins, else `default`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Switch {
    pub cases: Vec<SwitchCase>,
    pub default: Vec<String>,
}

/// `depends_components` / `depends_filepatterns` value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DependsField {
    List(Vec<String>),
    Switch(Switch),
}

impl DependsField {
    /// Items in effect for the given environment.
    pub fn resolve(&self, env: &dyn Lookup) -> expr::Result<&[String]> {
        match self {
            DependsField::List(items) => Ok(items),
            DependsField::Switch(switch) => {
                for case in &switch.cases {
                    if case.expr.evaluate(env)? {
                        return Ok(&case.content);
                    }
                }
                Ok(&switch.default)
            }
        }
    }

    /// Every item the field could ever resolve to.
    pub fn all_items(&self) -> Vec<&str> {
        match self {
            DependsField::List(items) => items.iter().map(String::as_str).collect(),
            DependsField::Switch(switch) => switch
                .cases
                .iter()
                .flat_map(|c| c.content.iter())
                .chain(switch.default.iter())
                .map(String::as_str)
                .collect(),
        }
    }
}

/// Build and test policy for one folder and everything below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderRule {
    /// Normalized folder path, joined with the manifest root.
    #[serde(skip)]
    pub folder: String,
    pub enable: Vec<IfClause>,
    pub disable: Vec<IfClause>,
    pub disable_test: Vec<IfClause>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_components: Option<DependsField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_filepatterns: Option<DependsField>,
    /// Document that last defined this rule.
    #[serde(skip)]
    pub document: String,
    /// Hex SHA-256 of the rule's canonical content.
    #[serde(skip)]
    pub digest: String,
}

impl FolderRule {
    /// Rule with no clauses: default targets only, no dependency info.
    pub fn empty(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            enable: Vec::new(),
            disable: Vec::new(),
            disable_test: Vec::new(),
            depends_components: None,
            depends_filepatterns: None,
            document: String::new(),
            digest: String::new(),
        }
    }

    /// Declares any dependency information at all.
    pub fn has_dependencies(&self) -> bool {
        self.depends_components.is_some() || self.depends_filepatterns.is_some()
    }
}

// ── Conversion ──────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIfClause {
    #[serde(rename = "if")]
    stmt: String,
    #[serde(default)]
    temporary: bool,
    #[serde(default)]
    reason: Option<String>,
}

/// Locates a value inside a document for error messages.
#[derive(Clone, Copy)]
pub(crate) struct Locator<'a> {
    pub document: &'a str,
    pub folder: &'a str,
}

impl Locator<'_> {
    fn field(&self, field: &str) -> String {
        format!("{}.{}", self.folder, field)
    }

    fn item(&self, field: &str, index: usize) -> String {
        format!("{}.{}[{}]", self.folder, field, index)
    }
}

/// Convert a directive-free folder record into a typed rule.
pub(crate) fn parse_rule(loc: Locator<'_>, folder_key: &str, record: &Mapping) -> Result<FolderRule> {
    let mut rule = FolderRule::empty(folder_key);
    rule.document = loc.document.to_string();

    for (key, value) in record {
        let key = key
            .as_str()
            .ok_or_else(|| ManifestError::invalid(loc.document, loc.folder, "rule keys must be strings"))?;
        match key {
            "enable" => rule.enable = parse_clauses(loc, key, value)?,
            "disable" => rule.disable = parse_clauses(loc, key, value)?,
            "disable_test" => rule.disable_test = parse_clauses(loc, key, value)?,
            "depends_components" => rule.depends_components = parse_depends(loc, key, value)?,
            "depends_filepatterns" => {
                let field = parse_depends(loc, key, value)?;
                if let Some(field) = &field {
                    validate_globs(loc, key, field)?;
                }
                rule.depends_filepatterns = field;
            }
            other => {
                return Err(ManifestError::invalid(
                    loc.document,
                    loc.field(other),
                    unknown_key_message(other, RULE_KEYS),
                ))
            }
        }
    }

    Ok(rule)
}

fn parse_clauses(loc: Locator<'_>, field: &str, value: &Yaml) -> Result<Vec<IfClause>> {
    let items = match value {
        Yaml::Null => return Ok(Vec::new()),
        Yaml::Sequence(items) => items,
        _ => {
            return Err(ManifestError::invalid(
                loc.document,
                loc.field(field),
                "expected a list of {if: ...} entries",
            ))
        }
    };

    let mut clauses = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let path = loc.item(field, index);
        let Some(map) = item.as_mapping() else {
            return Err(ManifestError::invalid(loc.document, path, "expected a mapping with an `if` key"));
        };
        check_keys(loc.document, &path, map, CLAUSE_KEYS)?;

        let raw: RawIfClause = serde_yaml::from_value(item.clone())
            .map_err(|e| ManifestError::invalid(loc.document, path.clone(), e.to_string()))?;
        if raw.temporary && raw.reason.as_deref().map_or(true, str::is_empty) {
            return Err(ManifestError::invalid(
                loc.document,
                path,
                "`temporary: true` requires a `reason`",
            ));
        }
        let expr = Expression::compile(&raw.stmt).map_err(|source| ManifestError::Syntax {
            document: loc.document.to_string(),
            path: path.clone(),
            source,
        })?;
        clauses.push(IfClause {
            expr,
            temporary: raw.temporary,
            reason: raw.reason,
        });
    }
    Ok(clauses)
}

fn parse_depends(loc: Locator<'_>, field: &str, value: &Yaml) -> Result<Option<DependsField>> {
    let items = match value {
        Yaml::Null => return Ok(None),
        Yaml::Sequence(items) => items,
        scalar => {
            let item = scalar_string(scalar).ok_or_else(|| {
                ManifestError::invalid(loc.document, loc.field(field), "expected a string or a list")
            })?;
            return Ok(Some(DependsField::List(vec![item])));
        }
    };

    let mappings = items.iter().filter(|i| i.is_mapping()).count();
    if mappings == 0 {
        let mut list = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let s = scalar_string(item).ok_or_else(|| {
                ManifestError::invalid(loc.document, loc.item(field, index), "expected a string")
            })?;
            list.push(s);
        }
        return Ok(Some(DependsField::List(list)));
    }
    if mappings != items.len() {
        return Err(ManifestError::invalid(
            loc.document,
            loc.field(field),
            "cannot mix plain entries with {if: ..., content: ...} cases",
        ));
    }

    let mut switch = Switch::default();
    let mut seen = HashSet::new();
    let mut has_default = false;

    for (index, item) in items.iter().enumerate() {
        let path = loc.item(field, index);
        let Some(map) = item.as_mapping() else {
            continue;
        };
        check_keys(loc.document, &path, map, SWITCH_KEYS)?;

        if let Some(default) = map.get("default") {
            if map.len() != 1 {
                return Err(ManifestError::invalid(loc.document, path, "`default` must stand alone"));
            }
            if has_default {
                return Err(ManifestError::invalid(loc.document, path, "duplicate `default` case"));
            }
            has_default = true;
            switch.default = string_list(loc.document, &path, default)?;
            continue;
        }

        let Some(stmt) = map.get("if").and_then(Yaml::as_str) else {
            return Err(ManifestError::invalid(loc.document, path, "case requires a string `if`"));
        };
        let expr = Expression::compile(stmt).map_err(|source| ManifestError::Syntax {
            document: loc.document.to_string(),
            path: path.clone(),
            source,
        })?;
        if !seen.insert(expr.key()) {
            return Err(ManifestError::invalid(
                loc.document,
                path,
                format!("duplicate case `{}`", stmt),
            ));
        }
        let content = match map.get("content") {
            Some(value) => string_list(loc.document, &path, value)?,
            None => Vec::new(),
        };
        switch.cases.push(SwitchCase { expr, content });
    }

    Ok(Some(DependsField::Switch(switch)))
}

fn check_keys(document: &str, path: &str, map: &Mapping, allowed: &[&str]) -> Result<()> {
    for key in map.keys() {
        match key.as_str() {
            Some(k) if allowed.contains(&k) => {}
            Some(k) => return Err(ManifestError::invalid(document, path, unknown_key_message(k, allowed))),
            None => return Err(ManifestError::invalid(document, path, "keys must be strings")),
        }
    }
    Ok(())
}

fn string_list(document: &str, path: &str, value: &Yaml) -> Result<Vec<String>> {
    match value {
        Yaml::Null => Ok(Vec::new()),
        Yaml::Sequence(items) => items
            .iter()
            .map(|item| {
                scalar_string(item)
                    .ok_or_else(|| ManifestError::invalid(document, path, "expected a list of strings"))
            })
            .collect(),
        scalar => scalar_string(scalar)
            .map(|s| vec![s])
            .ok_or_else(|| ManifestError::invalid(document, path, "expected a string or a list")),
    }
}

fn scalar_string(value: &Yaml) -> Option<String> {
    match value {
        Yaml::String(s) => Some(s.clone()),
        Yaml::Number(n) => Some(n.to_string()),
        Yaml::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn validate_globs(loc: Locator<'_>, field: &str, depends: &DependsField) -> Result<()> {
    for pattern in depends.all_items() {
        crate::deps::compile_glob(pattern).map_err(|source| ManifestError::Glob {
            document: loc.document.to_string(),
            path: loc.field(field),
            source,
        })?;
    }
    Ok(())
}
