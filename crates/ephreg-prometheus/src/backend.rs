use std::sync::Arc;

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};

use ephreg_core::metrics::{MetricsBackend, StageOutcome};

const NAMESPACE: &str = "ephreg";

/// Stage and teardown metrics kept in a prometheus [`Registry`].
///
/// Label values are bounded: `stage` is one of the registered stage names,
/// `outcome` one of `success|failure|canceled`, `step` one of the four
/// teardown steps.
#[derive(Clone)]
pub struct PrometheusMetrics {
    stages_started: CounterVec,
    stages_completed: CounterVec,
    stage_duration: HistogramVec,
    teardown_errors: CounterVec,
    registry: Arc<Registry>,
}

impl PrometheusMetrics {
    pub fn new_with_registry(registry: Arc<Registry>) -> Result<Self, prometheus::Error> {
        let stages_started = CounterVec::new(
            Opts::new("stages_started_total", "Provisioning stages started").namespace(NAMESPACE),
            &["stage"],
        )?;
        registry.register(Box::new(stages_started.clone()))?;

        let stages_completed = CounterVec::new(
            Opts::new("stages_completed_total", "Provisioning stages finished")
                .namespace(NAMESPACE),
            &["stage", "outcome"],
        )?;
        registry.register(Box::new(stages_completed.clone()))?;

        // Stages mostly wait on each other and on the API server; a controller
        // install can take minutes.
        let stage_duration = HistogramVec::new(
            HistogramOpts::new("stage_duration_seconds", "Wall time of a provisioning stage")
                .namespace(NAMESPACE)
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
            &["stage"],
        )?;
        registry.register(Box::new(stage_duration.clone()))?;

        let teardown_errors = CounterVec::new(
            Opts::new("teardown_errors_total", "Failed teardown steps").namespace(NAMESPACE),
            &["step"],
        )?;
        registry.register(Box::new(teardown_errors.clone()))?;

        Ok(Self {
            stages_started,
            stages_completed,
            stage_duration,
            teardown_errors,
            registry,
        })
    }

    pub fn new() -> Result<Self, prometheus::Error> {
        Self::new_with_registry(Arc::new(Registry::new()))
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Renders every family in the text exposition format.
    pub fn encode_text(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn record_stage_started(&self, stage: &str) {
        self.stages_started.with_label_values(&[stage]).inc();
    }

    fn record_stage_completed(&self, stage: &str, outcome: StageOutcome, duration_ms: u64) {
        self.stages_completed
            .with_label_values(&[stage, outcome.as_label()])
            .inc();
        self.stage_duration
            .with_label_values(&[stage])
            .observe(duration_ms as f64 / 1000.0);
    }

    fn record_teardown_error(&self, step: &str) {
        self.teardown_errors.with_label_values(&[step]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family<'a>(families: &'a [MetricFamily], name: &str) -> &'a MetricFamily {
        families
            .iter()
            .find(|f| f.name() == name)
            .unwrap_or_else(|| panic!("metric {name} not found"))
    }

    #[test]
    fn started_is_split_by_stage() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_stage_started("credentials");
        metrics.record_stage_started("credentials");
        metrics.record_stage_started("tls");

        let families = metrics.gather();
        let started = family(&families, "ephreg_stages_started_total");
        assert_eq!(started.get_metric().len(), 2);
    }

    #[test]
    fn completed_feeds_counter_and_histogram() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_stage_completed("deployment", StageOutcome::Success, 1_500);
        metrics.record_stage_completed("deployment", StageOutcome::Canceled, 20);

        let families = metrics.gather();
        assert_eq!(
            family(&families, "ephreg_stages_completed_total").get_metric().len(),
            2
        );

        let duration = family(&families, "ephreg_stage_duration_seconds");
        assert_eq!(duration.get_metric().len(), 1);

        let text = metrics.encode_text().unwrap();
        assert!(
            text.contains(r#"ephreg_stage_duration_seconds_count{stage="deployment"} 2"#),
            "{text}"
        );
    }

    #[test]
    fn text_output_names_teardown_step() {
        let metrics = PrometheusMetrics::new().unwrap();
        metrics.record_teardown_error("namespace");

        let text = metrics.encode_text().unwrap();
        assert!(
            text.contains(r#"ephreg_teardown_errors_total{step="namespace"} 1"#),
            "{text}"
        );
    }

    #[test]
    fn shared_registry_rejects_second_backend() {
        let registry = Arc::new(Registry::new());
        let _first = PrometheusMetrics::new_with_registry(registry.clone()).unwrap();
        assert!(PrometheusMetrics::new_with_registry(registry).is_err());
    }
}
