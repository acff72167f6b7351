//! Prometheus metrics collection

use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_int_gauge, Counter,
    CounterVec, Histogram, IntGauge,
};
use std::sync::OnceLock;

static METRICS: OnceLock<Metrics> = OnceLock::new();

pub struct Metrics {
    pub commits_total: CounterVec,
    pub commit_duration: Histogram,
    pub queue_depth: IntGauge,
    pub artifacts_uploaded: Counter,
    pub errors_total: CounterVec,
}

impl Metrics {
    pub fn init() -> &'static Self {
        METRICS.get_or_init(|| Metrics {
            commits_total: register_counter_vec!(
                "artifact_sync_commits_total",
                "Total number of commits reaching a terminal state",
                &["status"]
            )
            .expect("register artifact_sync_commits_total"),
            commit_duration: register_histogram!(
                "artifact_sync_commit_duration_seconds",
                "Time from dequeue to terminal state",
                vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]
            )
            .expect("register artifact_sync_commit_duration_seconds"),
            queue_depth: register_int_gauge!(
                "artifact_sync_queue_depth",
                "Commits waiting for the worker"
            )
            .expect("register artifact_sync_queue_depth"),
            artifacts_uploaded: register_counter!(
                "artifact_sync_artifacts_uploaded_total",
                "Artifacts whose content upload succeeded"
            )
            .expect("register artifact_sync_artifacts_uploaded_total"),
            errors_total: register_counter_vec!(
                "artifact_sync_errors_total",
                "Total number of commit errors",
                &["type"]
            )
            .expect("register artifact_sync_errors_total"),
        })
    }

    pub fn record_enqueued(&self) {
        self.queue_depth.inc();
    }

    pub fn record_dequeued(&self) {
        self.queue_depth.dec();
    }

    pub fn record_commit_complete(&self, status: &str, duration_secs: f64) {
        self.commits_total.with_label_values(&[status]).inc();
        self.commit_duration.observe(duration_secs);
    }

    pub fn record_upload(&self) {
        self.artifacts_uploaded.inc();
    }

    pub fn record_error(&self, error_type: &str) {
        self.errors_total.with_label_values(&[error_type]).inc();
    }
}

pub fn get_metrics() -> &'static Metrics {
    Metrics::init()
}
