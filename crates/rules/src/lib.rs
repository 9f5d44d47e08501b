//! Manifest-driven build and test gating for firmware apps.
//!
//! This crate provides:
//! - An `if` expression language over target capabilities
//! - YAML folder-rule manifests with `+`/`-` list directives
//! - Closest-ancestor rule resolution with a warm-up memo
//! - Per-target build/test eligibility with human-readable reasons
//! - Dependency-driven rebuild decisions from modified components and files

pub mod classify;
pub mod deps;
pub mod eligibility;
pub mod env;
pub mod expr;
pub mod manifest;
pub mod resolver;

pub use classify::{AppRecord, Classifier};
pub use deps::{BuildDecision, DependencyMatcher};
pub use eligibility::{eligible, enable_build_targets, enable_test_targets, AppEligibility};
pub use env::{CapabilitySource, CapabilityTable, Environment, NoCapabilities, VariableEnv};
pub use expr::{ExprError, Expression, Value};
pub use manifest::{Document, FolderRule, Manifest, ManifestError, ManifestLoader};
pub use resolver::RuleResolver;
