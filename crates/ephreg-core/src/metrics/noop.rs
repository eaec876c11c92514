use crate::metrics::backend::{MetricsBackend, StageOutcome};

/// Metrics backend that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {
    #[inline(always)]
    fn record_stage_started(&self, _: &str) {}

    #[inline(always)]
    fn record_stage_completed(&self, _: &str, _: StageOutcome, _: u64) {}

    #[inline(always)]
    fn record_teardown_error(&self, _: &str) {}
}
