//! # portwatch - port scan jobs with service identification
//!
//! portwatch runs TCP connect scans as persistent jobs. Each job expands a
//! port specification, probes every port under a concurrency bound, grabs a
//! banner from open ports and labels the service behind them. Jobs are stored
//! as they progress, so they can be inspected, cancelled and exported later.
//! Schedules re-run a scan periodically through a trigger loop.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use portwatch::engine::ScanEngine;
//! use portwatch::scanner::ScannerConfig;
//! use portwatch::storage::MemoryJobStore;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = ScanEngine::with_tcp(Arc::new(MemoryJobStore::new()), &ScannerConfig::default());
//!     let job = engine.create_job("127.0.0.1", "22,80,443")?;
//!     let summary = engine.wait_for(&job.id, Duration::from_millis(200)).await?;
//!     println!("{} open ports", summary.open_ports);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Ports, port specifications, targets and ids
//! - [`scanner`] - The `Prober` trait, the TCP prober and the scan coordinator
//! - [`banner`] / [`services`] - Banner collection and service labelling
//! - [`engine`] - Job lifecycle: create, track, cancel, list
//! - [`scheduler`] - Schedule definitions, due policies and the trigger loop
//! - [`storage`] - Job and schedule persistence
//! - [`config`] - Settings and directory discovery
//! - [`output`] - Plain, JSON and CSV rendering

pub mod banner;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod job;
pub mod output;
pub mod scanner;
pub mod scheduler;
pub mod services;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use engine::{JobFilter, ScanEngine};
pub use error::{CliError, EngineError, ScheduleError, StorageError};
pub use job::{JobStatus, JobSummary, ScanJob};
pub use scanner::{PortOutcome, PortStatus, Prober, ScannerConfig};
pub use scheduler::{ScheduleDefinition, ScheduleTrigger};
pub use types::{JobId, Port, PortSpec, ScheduleId, Target};
