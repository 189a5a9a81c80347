//! Prometheus metrics recorder and metric names.
//!
//! # Metrics
//!
//! | Name | Kind | Labels |
//! |---|---|---|
//! | `http_requests_total` | counter | `method`, `path`, `status` |
//! | `http_request_duration_seconds` | histogram | `method`, `path` |
//! | `cache_hits_total` / `cache_misses_total` | counter | `function` |
//! | `rate_limit_rejections_total` | counter | `scope` |
//! | `tasks_enqueued_total` | counter | `task` |
//! | `tasks_succeeded_total` / `tasks_retried_total` / `tasks_failed_total` | counter | `task` |
//! | `users_total` / `users_active_total` | gauge | |
//! | `orders_total` | gauge | `status` |

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::sync::Arc;

/// Prometheus handle for on-demand scrape output (`GET /metrics`).
pub type PrometheusHandle = metrics_exporter_prometheus::PrometheusHandle;

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Installs the global metrics recorder and returns a handle for rendering.
///
/// No HTTP listener is started; the API renders the handle itself.
///
/// # Errors
///
/// Returns an error if a recorder is already installed or building fails.
pub fn init_metrics() -> Result<PrometheusHandle, metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install_recorder()
}

/// Like [`init_metrics`], but returns `None` if a recorder is already installed.
#[must_use]
pub fn init_metrics_handle() -> Option<Arc<PrometheusHandle>> {
    init_metrics().ok().map(Arc::new)
}
