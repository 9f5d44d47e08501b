//! Build-status lifecycle for a single app.
//!
//! ```text
//! unknown ──► disabled
//!         ├─► skipped
//!         └─► should_build ──► build_success
//!                          └─► build_failed
//! ```
//!
//! `disabled` and `skipped` apps only re-enter `should_build` through
//! [`BuildState::include`] when the matching [`InclusionFlags`] is set.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Classification and outcome of one app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    #[default]
    Unknown,
    Disabled,
    Skipped,
    ShouldBuild,
    BuildFailed,
    BuildSuccess,
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Unknown => "unknown",
            BuildStatus::Disabled => "disabled",
            BuildStatus::Skipped => "skipped",
            BuildStatus::ShouldBuild => "should_build",
            BuildStatus::BuildFailed => "build_failed",
            BuildStatus::BuildSuccess => "build_success",
        }
    }

    /// Whether the orchestrator may move directly from `self` to `next`.
    pub fn can_transition_to(self, next: BuildStatus) -> bool {
        use BuildStatus::*;
        matches!(
            (self, next),
            (Unknown, Disabled | Skipped | ShouldBuild) | (ShouldBuild, BuildFailed | BuildSuccess)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BuildStatus::BuildFailed | BuildStatus::BuildSuccess)
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller flags that pull excluded apps back into the active batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionFlags {
    pub include_disabled: bool,
    pub include_skipped: bool,
}

/// Current status plus the human-readable reason for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildState {
    pub status: BuildStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BuildState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `next`, failing fast on an illegal edge.
    pub fn transition(&mut self, next: BuildStatus, reason: Option<String>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        tracing::debug!(from = %self.status, to = %next, reason = reason.as_deref().unwrap_or(""), "build status transition");
        self.status = next;
        self.reason = reason;
        Ok(())
    }

    /// Re-admit a `disabled`/`skipped` app into `should_build` when the
    /// corresponding flag is set. Returns whether the app is now active.
    ///
    /// The original reason is kept so reports still explain the exclusion.
    pub fn include(&mut self, flags: InclusionFlags) -> Result<bool> {
        let admitted = match self.status {
            BuildStatus::ShouldBuild => return Ok(true),
            BuildStatus::Disabled => flags.include_disabled,
            BuildStatus::Skipped => flags.include_skipped,
            BuildStatus::Unknown => {
                return Err(CoreError::InvalidTransition {
                    from: BuildStatus::Unknown,
                    to: BuildStatus::ShouldBuild,
                })
            }
            BuildStatus::BuildFailed | BuildStatus::BuildSuccess => false,
        };
        if admitted {
            tracing::debug!(from = %self.status, "including excluded app in active batch");
            self.status = BuildStatus::ShouldBuild;
        }
        Ok(admitted)
    }

    pub fn is_active(&self) -> bool {
        self.status == BuildStatus::ShouldBuild
    }
}
