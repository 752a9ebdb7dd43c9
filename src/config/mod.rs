//! Configuration management for portwatch.
//!
//! Provides XDG-compliant directory discovery and the settings file that
//! feeds the scanner and the schedule trigger loop.

mod settings;

pub use settings::{Paths, Settings, DEFAULT_COMMON_PORTS};
