//! Pipeline configuration

use crate::retry::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one provisioning run.
///
/// Built once at startup (from CLI flags) and owned by the pipeline;
/// there is no process-wide mutable configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Project id prefix for generated work items
    pub prefix: String,

    /// Service to enable on each created project
    pub capability: String,

    /// Concurrent tasks per stage
    pub concurrency: usize,

    /// Retry policy for every provider operation
    pub retry: RetryPolicy,

    /// Pause between the create and enable stages, letting the
    /// provider's eventual consistency settle
    pub settle_wait: Duration,

    /// Burst throttle: pause after this many dispatched tasks
    /// (0 disables the throttle)
    pub burst_size: u32,

    /// Length of the burst throttle pause
    pub burst_pause: Duration,

    /// Whether the failure-rate circuit breaker is active
    pub breaker_enabled: bool,

    /// Failure fraction that trips the breaker
    pub breaker_threshold: f64,

    /// Minimum observations before the breaker may trip
    pub breaker_min_samples: u32,

    /// Grace period for in-flight tasks after an interrupt
    pub grace_period: Duration,

    /// Directory the credential files are written to
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            prefix: "keyflow".to_string(),
            capability: "generativelanguage.googleapis.com".to_string(),
            concurrency: 5,
            retry: RetryPolicy::default(),
            settle_wait: Duration::from_secs(20),
            burst_size: 10,
            burst_pause: Duration::from_secs(2),
            breaker_enabled: true,
            breaker_threshold: 0.3,
            breaker_min_samples: 10,
            grace_period: Duration::from_secs(30),
            output_dir: PathBuf::from("."),
        }
    }
}
