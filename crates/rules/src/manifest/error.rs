//! Error types for manifest loading.

use crate::expr::ExprError;

/// Errors raised while turning manifest documents into folder rules.
///
/// Every variant names the document it came from; structural errors also
/// carry a `folder.field[index]` path.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Filesystem I/O error while reading a manifest file.
    #[error("{path}: IO error: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Document is not valid YAML.
    #[error("{document}:{line}: YAML parse error: {message}")]
    Yaml {
        document: String,
        line: usize,
        message: String,
    },

    /// An `if` clause failed to compile.
    #[error("{document}: {path}: invalid if clause: {source}")]
    Syntax {
        document: String,
        path: String,
        #[source]
        source: ExprError,
    },

    /// Wrong shape, unknown key, duplicate switch case and similar.
    #[error("{document}: {path}: {message}")]
    Invalid {
        document: String,
        path: String,
        message: String,
    },

    /// A glob in `depends_filepatterns` does not compile.
    #[error("{document}: {path}: invalid glob pattern: {source}")]
    Glob {
        document: String,
        path: String,
        #[source]
        source: globset::Error,
    },

    /// A rule names a folder that does not exist on disk.
    #[error("{document}: folder \"{folder}\" does not exist")]
    MissingFolder { document: String, folder: String },
}

impl ManifestError {
    pub(crate) fn invalid(document: &str, path: impl Into<String>, message: impl Into<String>) -> Self {
        ManifestError::Invalid {
            document: document.to_string(),
            path: path.into(),
            message: message.into(),
        }
    }

    /// Document the error was raised for, if any.
    pub fn document(&self) -> Option<&str> {
        match self {
            ManifestError::Io { .. } => None,
            ManifestError::Yaml { document, .. }
            | ManifestError::Syntax { document, .. }
            | ManifestError::Invalid { document, .. }
            | ManifestError::Glob { document, .. }
            | ManifestError::MissingFolder { document, .. } => Some(document),
        }
    }
}

/// Result alias for manifest operations.
pub type Result<T> = std::result::Result<T, ManifestError>;
