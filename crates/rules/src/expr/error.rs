//! Errors raised while compiling or evaluating `if` expressions.

/// Expression failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExprError {
    /// Malformed expression text. `offset` is the byte position of the offending token.
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// Incoherent comparison at evaluation time (e.g. list with `<`).
    #[error("evaluation error: {0}")]
    Evaluation(String),
}

impl ExprError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        ExprError::Syntax {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn evaluation(message: impl Into<String>) -> Self {
        ExprError::Evaluation(message.into())
    }
}

/// Result alias for expression operations.
pub type Result<T> = std::result::Result<T, ExprError>;
