use std::sync::Arc;

/// How a provisioning stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Success,
    Failure,
    /// Unwound because a sibling failed or the run was cancelled.
    Canceled,
}

impl StageOutcome {
    /// Return label value for metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            StageOutcome::Success => "success",
            StageOutcome::Failure => "failure",
            StageOutcome::Canceled => "canceled",
        }
    }
}

/// Backend metrics collection interface.
///
/// Implementations are injected into the setup pipeline and the teardown
/// sequencer.
pub trait MetricsBackend: Send + Sync + 'static {
    /// Called when a stage task is spawned.
    fn record_stage_started(&self, stage: &str);

    /// Called once per stage with its outcome and wall time.
    fn record_stage_completed(&self, stage: &str, outcome: StageOutcome, duration_ms: u64);

    /// Called for every teardown step that failed.
    fn record_teardown_error(&self, step: &str);
}

/// Shared handle to metrics backend.
pub type MetricsHandle = Arc<dyn MetricsBackend>;
