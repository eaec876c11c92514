//! Prometheus backend for provisioning metrics.
//!
//! [`PrometheusMetrics`] implements [`ephreg_core::metrics::MetricsBackend`].
//! A provisioning run is a short-lived process, so nothing is served over
//! HTTP: the CLI renders the registry once with
//! [`PrometheusMetrics::encode_text`] and writes it next to the run's other
//! artifacts, where a node-exporter textfile collector or a CI step can pick
//! it up.
//!
//! ## Metrics
//! - `ephreg_stages_started_total{stage}` - Counter
//! - `ephreg_stages_completed_total{stage, outcome}` - Counter
//! - `ephreg_stage_duration_seconds{stage}` - Histogram
//! - `ephreg_teardown_errors_total{step}` - Counter

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
