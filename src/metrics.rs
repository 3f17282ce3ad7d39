use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use once_cell::sync::{Lazy, OnceCell};
use prometheus::{
    core::Collector, histogram_opts, Encoder, HistogramVec, IntCounterVec, IntGauge, Registry,
    TextEncoder,
};
use tracing::error;

static GLOBAL_REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);
static REGISTER_ONCE: OnceCell<()> = OnceCell::new();

lazy_static! {
    static ref TASKS_STARTED_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("taskpilot_tasks_started_total", "Tasks started by engine mode"),
        &["mode"]
    )
    .expect("tasks started metric");
    static ref TASKS_FINISHED_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "taskpilot_tasks_finished_total",
            "Tasks reaching a terminal status"
        ),
        &["status"]
    )
    .expect("tasks finished metric");
    static ref STEPS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("taskpilot_steps_total", "Executed steps by action and outcome"),
        &["action", "success"]
    )
    .expect("steps metric");
    static ref ACTION_DURATION: HistogramVec = HistogramVec::new(
        histogram_opts!(
            "taskpilot_action_duration_seconds",
            "Browser action latency",
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
        ),
        &["action"]
    )
    .expect("action duration metric");
    static ref REASONING_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "taskpilot_reasoning_failures_total",
            "Reasoning calls that failed by error kind"
        ),
        &["kind"]
    )
    .expect("reasoning failures metric");
    static ref ACTIVE_SESSIONS: IntGauge = IntGauge::new(
        "taskpilot_remote_sessions_active",
        "Browser sessions held open for remote executor clients"
    )
    .expect("active sessions metric");
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register metric");
        }
    }
}

pub fn register_metrics() {
    REGISTER_ONCE.get_or_init(|| {
        let registry = global_registry();
        register(registry, TASKS_STARTED_TOTAL.clone());
        register(registry, TASKS_FINISHED_TOTAL.clone());
        register(registry, STEPS_TOTAL.clone());
        register(registry, ACTION_DURATION.clone());
        register(registry, REASONING_FAILURES_TOTAL.clone());
        register(registry, ACTIVE_SESSIONS.clone());
    });
}

pub fn global_registry() -> &'static Registry {
    &GLOBAL_REGISTRY
}

pub fn record_task_started(mode: &str) {
    TASKS_STARTED_TOTAL.with_label_values(&[mode]).inc();
}

pub fn record_task_finished(status: &str) {
    TASKS_FINISHED_TOTAL.with_label_values(&[status]).inc();
}

pub fn record_step(action: &str, success: bool, elapsed: Duration) {
    let success = if success { "true" } else { "false" };
    STEPS_TOTAL.with_label_values(&[action, success]).inc();
    ACTION_DURATION
        .with_label_values(&[action])
        .observe(elapsed.as_secs_f64());
}

pub fn record_reasoning_failure(kind: &str) {
    REASONING_FAILURES_TOTAL.with_label_values(&[kind]).inc();
}

pub fn set_active_sessions(count: usize) {
    ACTIVE_SESSIONS.set(count as i64);
}

/// Prometheus text exposition of the global registry.
pub async fn metrics_handler() -> Response {
    register_metrics();
    let encoder = TextEncoder::new();
    let metric_families = global_registry().gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!(?err, "failed to encode prometheus metrics");
        return (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response();
    }
    match HeaderValue::from_str(encoder.format_type()) {
        Ok(value) => ([(CONTENT_TYPE, value)], buffer).into_response(),
        Err(err) => {
            error!(?err, "failed to build content-type header");
            (StatusCode::INTERNAL_SERVER_ERROR, "metric encode error").into_response()
        }
    }
}
