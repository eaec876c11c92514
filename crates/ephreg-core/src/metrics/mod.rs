//! Metrics collection abstraction for provisioning stages and teardown.
//!
//! Backends (see `ephreg-prometheus`) implement [`MetricsBackend`] and are
//! handed to [`crate::pipeline::SetupPipeline`] and
//! [`crate::teardown::TeardownSequencer`].
mod backend;
pub use backend::{MetricsBackend, MetricsHandle, StageOutcome};

mod noop;
pub use noop::NoOpMetrics;

use std::sync::Arc;

/// Create a no-op metrics handle.
#[inline]
pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoOpMetrics)
}
