//! The `if` expression language used by manifest rules.
//!
//! Expressions compare capability identifiers against literals:
//!
//! ```text
//! IDF_TARGET in ["esp32", "esp32s3"] and SOC_WIFI_SUPPORTED == 1
//! ```
//!
//! Compile once with [`Expression::compile`], evaluate many times against
//! any [`Lookup`].

mod ast;
mod error;
mod eval;
mod lexer;
mod parser;
mod value;

#[cfg(test)]
mod tests;

use std::fmt;

use serde::{Serialize, Serializer};

pub use ast::{CmpOp, Literal, Node, Operand};
pub use error::{ExprError, Result};
pub use eval::Lookup;
pub use value::Value;

/// A compiled, immutable expression.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    /// Parse `source` into an evaluable tree.
    pub fn compile(source: &str) -> Result<Self> {
        let tokens = lexer::tokenize(source)?;
        let root = parser::Parser::new(&tokens, source.len()).parse()?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    /// Evaluate against `env`. Pure: no state is touched.
    pub fn evaluate(&self, env: &dyn Lookup) -> Result<bool> {
        eval::eval_node(&self.root, env)
    }

    /// Original text, as written in the manifest.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Text with all whitespace removed; two clauses with equal keys are
    /// the same clause for merging and duplicate detection.
    pub fn key(&self) -> String {
        normalize_key(&self.source)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }
}

/// Whitespace-insensitive form of an expression string.
pub fn normalize_key(source: &str) -> String {
    source.chars().filter(|c| !c.is_whitespace()).collect()
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Expression {}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}
