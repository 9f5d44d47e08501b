//! Postfix `+` / `-` list directives.
//!
//! `enable+:` appends to the list `enable` would otherwise have and
//! `enable-:` removes from it. The base is the record's own `enable`, else
//! the same folder's value from an earlier document, else empty. Within a
//! record `+` is applied before `-`.
//!
//! List items fall into three kinds with distinct identities:
//! mappings with an `if` key (identified by the whitespace-free `if` text),
//! other mappings (identified by their first key, e.g. `default`) and
//! scalars (identified by value). Adding an item whose identity already
//! exists replaces it in place; removing an absent item is a no-op.

use serde_yaml::{Mapping, Value as Yaml};

use super::error::{ManifestError, Result};
use super::schema::RULE_KEYS;
use super::suggest::unknown_key_message;
use crate::expr::normalize_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Directive {
    Add,
    Remove,
}

impl Directive {
    fn symbol(self) -> char {
        match self {
            Directive::Add => '+',
            Directive::Remove => '-',
        }
    }
}

fn split_key(key: &str) -> (&str, Option<Directive>) {
    if let Some(base) = key.strip_suffix('+') {
        (base, Some(Directive::Add))
    } else if let Some(base) = key.strip_suffix('-') {
        (base, Some(Directive::Remove))
    } else {
        (key, None)
    }
}

/// Resolve all directives in `record`, returning a record with plain keys only.
pub(crate) fn apply_directives(
    document: &str,
    folder: &str,
    record: &Mapping,
    previous: Option<&Mapping>,
) -> Result<Mapping> {
    let mut out = Mapping::new();
    let mut directives: Vec<(&str, Directive, &Yaml)> = Vec::new();

    for (key, value) in record {
        let Some(key) = key.as_str() else {
            return Err(ManifestError::invalid(document, folder, "rule keys must be strings"));
        };
        let (base, directive) = split_key(key);
        if !RULE_KEYS.contains(&base) {
            return Err(ManifestError::invalid(
                document,
                format!("{}.{}", folder, key),
                unknown_key_message(base, RULE_KEYS),
            ));
        }
        match directive {
            None => {
                out.insert(Yaml::String(base.to_string()), value.clone());
            }
            Some(d) => directives.push((base, d, value)),
        }
    }

    // Per field, `+` before `-`.
    directives.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));

    for (base, directive, value) in directives {
        let path = format!("{}.{}{}", folder, base, directive.symbol());
        let current = out
            .get(base)
            .or_else(|| previous.and_then(|p| p.get(base)))
            .cloned()
            .unwrap_or(Yaml::Null);

        let mut list = as_list(document, &path, current)?;
        let operands = as_list(document, &path, value.clone())?;

        match directive {
            Directive::Add => add_items(&mut list, operands),
            Directive::Remove => remove_items(&mut list, &operands, folder, base),
        }
        tracing::trace!(folder, field = base, directive = %directive.symbol(), len = list.len(), "applied list directive");
        out.insert(Yaml::String(base.to_string()), Yaml::Sequence(list));
    }

    Ok(out)
}

fn as_list(document: &str, path: &str, value: Yaml) -> Result<Vec<Yaml>> {
    match value {
        Yaml::Null => Ok(Vec::new()),
        Yaml::Sequence(items) => Ok(items),
        Yaml::Mapping(_) => Err(ManifestError::invalid(
            document,
            path,
            "list directives need a list value",
        )),
        scalar => Ok(vec![scalar]),
    }
}

#[derive(Debug, PartialEq)]
enum Identity<'a> {
    If(String),
    Keyed(&'a str),
    Scalar(&'a Yaml),
}

fn identity(item: &Yaml) -> Identity<'_> {
    if let Some(map) = item.as_mapping() {
        if let Some(stmt) = map.get("if").and_then(Yaml::as_str) {
            return Identity::If(normalize_key(stmt));
        }
        if let Some(first) = map.keys().next().and_then(Yaml::as_str) {
            return Identity::Keyed(first);
        }
    }
    Identity::Scalar(item)
}

fn add_items(list: &mut Vec<Yaml>, items: Vec<Yaml>) {
    for item in items {
        let pos = {
            let id = identity(&item);
            list.iter().position(|existing| identity(existing) == id)
        };
        match pos {
            Some(i) => list[i] = item,
            None => list.push(item),
        }
    }
}

fn remove_items(list: &mut Vec<Yaml>, items: &[Yaml], folder: &str, field: &str) {
    for item in items {
        let id = identity(item);
        let before = list.len();
        list.retain(|existing| identity(existing) != id);
        if list.len() == before {
            tracing::debug!(folder, field, item = ?item, "nothing to remove");
        }
    }
}
