//! Core type definitions using newtype patterns for type safety.
//!
//! These types prevent common logic errors by making invalid states unrepresentable
//! at compile time.

mod job_id;
mod port;
mod target;

pub use job_id::{JobId, JobIdError, ScheduleId, SHORT_ID_LEN};
pub use port::{expand, Port, PortError, PortRange, PortSpec};
pub use target::{Target, TargetError};
