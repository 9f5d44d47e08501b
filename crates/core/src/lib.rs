pub mod app;
pub mod batch;
pub mod config;
pub mod error;
pub mod status;
pub mod version;

pub use app::{App, AppKind, AppKindRegistry, BuildCommand, BuildOutcome, BuildRunner};
pub use config::Config;
pub use error::*;
pub use status::{BuildState, BuildStatus, InclusionFlags};
pub use version::Version;
