use thiserror::Error;

use crate::status::BuildStatus;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Illegal build status transition: {from} -> {to}")]
    InvalidTransition { from: BuildStatus, to: BuildStatus },

    #[error("Build system '{0}' is already registered")]
    DuplicateBuildSystem(String),

    #[error("Unknown build system: {0}")]
    UnknownBuildSystem(String),

    #[error("Invalid version string: {0}")]
    InvalidVersion(String),

    #[error("Invalid parallel slice: {0}")]
    InvalidSlice(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
