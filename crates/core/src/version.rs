//! Three-part numeric framework version (`major.minor.patch`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Framework version, ordered as a numeric tuple.
///
/// Parsing accepts one to three dot-separated components with an optional
/// leading `v`; missing components are zero (`"5.1"` is `5.1.0`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl FromStr for Version {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix('v').unwrap_or(trimmed);
        if body.is_empty() {
            return Err(CoreError::InvalidVersion(s.to_string()));
        }

        let mut parts = [0u32; 3];
        let mut count = 0;
        for piece in body.split('.') {
            if count == 3 {
                return Err(CoreError::InvalidVersion(s.to_string()));
            }
            parts[count] = piece
                .parse()
                .map_err(|_| CoreError::InvalidVersion(s.to_string()))?;
            count += 1;
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
