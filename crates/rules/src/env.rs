//! Variable environment used to evaluate `if` clauses for one app.
//!
//! [`Environment`] holds what is shared across a run (framework version,
//! default targets, capability tables, captured process variables).
//! [`VariableEnv`] scopes it to one `(target, config)` pair and is the
//! [`Lookup`] handed to the evaluator.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsString;
use std::sync::Arc;

use appgate_core::Version;
use tracing::{trace, warn};

use crate::expr::{Lookup, Value};

/// Per-target capability values (`SOC_*` and friends).
pub trait CapabilitySource: Send + Sync {
    fn capability(&self, target: &str, name: &str) -> Option<Value>;
}

/// No capabilities known; every `SOC_*` lookup falls through.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCapabilities;

impl CapabilitySource for NoCapabilities {
    fn capability(&self, _target: &str, _name: &str) -> Option<Value> {
        None
    }
}

/// In-memory capability table keyed by target then identifier.
#[derive(Debug, Default, Clone)]
pub struct CapabilityTable {
    targets: BTreeMap<String, HashMap<String, Value>>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, target: &str, name: &str, value: impl Into<Value>) -> &mut Self {
        self.targets
            .entry(target.to_string())
            .or_default()
            .insert(name.to_string(), value.into());
        self
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    /// Parse a `target: {NAME: value}` YAML table.
    ///
    /// Integers and strings are kept as-is, booleans become `0`/`1`;
    /// other values are skipped.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        let raw: BTreeMap<String, BTreeMap<String, serde_yaml::Value>> = serde_yaml::from_str(text)?;
        let mut table = Self::new();
        for (target, caps) in raw {
            for (name, value) in caps {
                let value = match value {
                    serde_yaml::Value::Number(n) => match n.as_i64() {
                        Some(i) => Value::Int(i),
                        None => {
                            warn!(target = %target, name = %name, "non-integer capability skipped");
                            continue;
                        }
                    },
                    serde_yaml::Value::String(s) => Value::Str(s),
                    serde_yaml::Value::Bool(b) => Value::Int(i64::from(b)),
                    _ => {
                        warn!(target = %target, name = %name, "unsupported capability value skipped");
                        continue;
                    }
                };
                table.insert(&target, &name, value);
            }
        }
        Ok(table)
    }
}

impl CapabilitySource for CapabilityTable {
    fn capability(&self, target: &str, name: &str) -> Option<Value> {
        self.targets.get(target)?.get(name).cloned()
    }
}

/// Immutable, shareable evaluation context.
#[derive(Clone)]
pub struct Environment {
    version: Version,
    default_build_targets: Vec<String>,
    capabilities: Arc<dyn CapabilitySource>,
    variables: HashMap<String, Value>,
}

impl Environment {
    pub fn new(version: Version, default_build_targets: Vec<String>) -> Self {
        Self {
            version,
            default_build_targets,
            capabilities: Arc::new(NoCapabilities),
            variables: HashMap::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Arc<dyn CapabilitySource>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Capture variables as expression values.
    ///
    /// Integer-looking values become integers; the rest stay strings. For the
    /// process environment use [`with_os_variables`](Self::with_os_variables).
    pub fn with_variables<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            self.variables
                .insert(key.into(), Value::from_env_str(value.as_ref()));
        }
        self
    }

    /// Capture `std::env::vars_os()`-style pairs, skipping any that are not
    /// valid UTF-8.
    pub fn with_os_variables<I>(self, vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        self.with_variables(vars.into_iter().filter_map(|(k, v)| match (k.into_string(), v.into_string()) {
            (Ok(k), Ok(v)) => Some((k, v)),
            (k, _) => {
                trace!(variable = ?k.unwrap_or_else(|raw| raw.to_string_lossy().into_owned()), "skipping non-UTF-8 variable");
                None
            }
        }))
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn default_build_targets(&self) -> &[String] {
        &self.default_build_targets
    }

    pub fn is_default_target(&self, target: &str) -> bool {
        self.default_build_targets.iter().any(|t| t == target)
    }

    /// Scope the environment to one app.
    pub fn scope<'a>(&'a self, target: &'a str, config_name: Option<&'a str>) -> VariableEnv<'a> {
        VariableEnv {
            env: self,
            target,
            config_name: config_name.unwrap_or(""),
        }
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("version", &self.version)
            .field("default_build_targets", &self.default_build_targets)
            .field("variables", &self.variables.len())
            .finish_non_exhaustive()
    }
}

/// Environment bound to a target and config name.
#[derive(Debug, Clone, Copy)]
pub struct VariableEnv<'a> {
    env: &'a Environment,
    target: &'a str,
    config_name: &'a str,
}

impl<'a> VariableEnv<'a> {
    pub fn target(&self) -> &'a str {
        self.target
    }

    pub fn config_name(&self) -> &'a str {
        self.config_name
    }

    pub fn environment(&self) -> &'a Environment {
        self.env
    }
}

impl Lookup for VariableEnv<'_> {
    fn lookup(&self, name: &str) -> Value {
        match name {
            "IDF_TARGET" => return Value::from(self.target),
            "CONFIG_NAME" => return Value::from(self.config_name),
            "INCLUDE_DEFAULT" => return Value::Int(self.env.is_default_target(self.target) as i64),
            "IDF_VERSION" => return Value::Version(self.env.version),
            "IDF_VERSION_MAJOR" => return Value::Int(self.env.version.major as i64),
            "IDF_VERSION_MINOR" => return Value::Int(self.env.version.minor as i64),
            "IDF_VERSION_PATCH" => return Value::Int(self.env.version.patch as i64),
            _ => {}
        }

        if let Some(value) = self.env.capabilities.capability(self.target, name) {
            return value;
        }
        if let Some(value) = self.env.variables.get(name) {
            return value.clone();
        }

        trace!(identifier = name, target = self.target, "unknown identifier, using 0");
        Value::Int(0)
    }
}
