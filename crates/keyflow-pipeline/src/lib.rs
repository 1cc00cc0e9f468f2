//! Keyflow Provisioning Pipeline
//!
//! Runs a flat batch of work items through the four provisioning stages
//! (create → settle wait → enable → extract) with bounded concurrency,
//! per-item retry/backoff, an optional failure-rate circuit breaker, and
//! a concurrency-safe credential sink.
//!
//! Survivors of each stage feed the next; a stage with zero survivors
//! aborts the run. Individual item failures never do.

pub mod breaker;
pub mod config;
pub mod error;
pub mod naming;
pub mod orchestrator;
pub mod report;
pub mod retry;
pub mod runner;
pub mod sink;

// Re-exports
pub use breaker::HealthMonitor;
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use naming::{NameScheme, WorkItem};
pub use orchestrator::{Pipeline, StartStage};
pub use report::{RunReport, StageKind, StageStats};
pub use retry::{ItemFailure, RetryPolicy};
pub use runner::{Outcome, StageOutcome, StageRunner};
pub use sink::{Credential, CredentialSink, OutputFiles, CSV_FILE, LINE_FILE};
