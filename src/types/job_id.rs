//! Unique identifiers for scan jobs and schedule definitions.
//!
//! Both are UUID v4 newtypes so a job id can never be passed where a
//! schedule id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Length of the short, human-facing form of an id.
pub const SHORT_ID_LEN: usize = 8;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Get a short representation (first 8 characters).
            pub fn short(&self) -> String {
                self.0.to_string()[..SHORT_ID_LEN].to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = JobIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                if s.len() < 36 {
                    // Prefixes need a store lookup to resolve.
                    return Err(JobIdError::ShortFormNotSupported(s.to_string()));
                }
                let uuid =
                    Uuid::parse_str(s).map_err(|_| JobIdError::InvalidFormat(s.to_string()))?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_id!(
    /// Identifier of a scan job.
    JobId
);

uuid_id!(
    /// Identifier of a scheduled scan definition.
    ScheduleId
);

/// Error type for id parsing.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobIdError {
    #[error("invalid id format: {0}")]
    InvalidFormat(String),
    #[error("short id '{0}' requires a store lookup")]
    ShortFormNotSupported(String),
}
