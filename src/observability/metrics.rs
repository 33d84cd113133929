//! Metrics for the normalize-and-load run.
//!
//! Recording goes through the `metrics` facade and is a no-op until `init()`
//! installs the Prometheus recorder. A one-shot batch job has nothing to scrape
//! it, so the rendered snapshot is pushed to a Pushgateway at the end of a run
//! when `CMS_PUSHGATEWAY_URL` is set.

use std::fmt;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Enum representing all metric names used in the system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Normalize metrics
    NormalizeRowsRead,
    NormalizeRowsWritten,
    NormalizeRowsDropped,

    // Load metrics
    LoadBatchesAccepted,
    LoadBatchesFailed,
    LoadRowsAccepted,
    LoadBatchDuration,
    LoadRunTimestamp,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::NormalizeRowsRead => "cms_normalize_rows_read_total",
            MetricName::NormalizeRowsWritten => "cms_normalize_rows_written_total",
            MetricName::NormalizeRowsDropped => "cms_normalize_rows_dropped_total",
            MetricName::LoadBatchesAccepted => "cms_load_batches_accepted_total",
            MetricName::LoadBatchesFailed => "cms_load_batches_failed_total",
            MetricName::LoadRowsAccepted => "cms_load_rows_accepted_total",
            MetricName::LoadBatchDuration => "cms_load_batch_duration_seconds",
            MetricName::LoadRunTimestamp => "cms_load_last_run_timestamp_seconds",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static METRICS_HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Safe to call once per process.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))?;
    METRICS_HANDLE.set(handle).ok();
    info!("Metrics system initialized");
    Ok(())
}

/// Current snapshot in Prometheus text format, if the recorder is installed
pub fn render() -> Option<String> {
    METRICS_HANDLE.get().map(|handle| handle.render())
}

/// Push the current snapshot to the Pushgateway. Failures are logged, never returned.
pub async fn push_to_gateway(job: &str) {
    let base = match std::env::var("CMS_PUSHGATEWAY_URL") {
        Ok(v) if !v.trim().is_empty() => v,
        _ => return,
    };
    let Some(body) = render() else {
        return;
    };
    let push_url = format!("{}/metrics/job/{}", base.trim_end_matches('/'), job);

    let client = reqwest::Client::new();
    let push_res = client
        .post(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .send()
        .await;

    match push_res {
        Ok(r) if r.status().is_success() => info!("Pushed metrics to Pushgateway for job={}", job),
        Ok(r) => warn!(
            "Pushgateway push responded with status {} for job={}",
            r.status().as_u16(),
            job
        ),
        Err(e) => warn!("Failed to push metrics to Pushgateway for job={}: {}", job, e),
    }
}

// ============================================================================
// Normalize Metrics
// ============================================================================

pub mod normalize {
    use super::MetricName;

    pub fn rows_read(table: &str, count: usize) {
        ::metrics::counter!(MetricName::NormalizeRowsRead.as_str(), "table" => table.to_string())
            .increment(count as u64);
    }

    pub fn rows_written(table: &str, count: usize) {
        ::metrics::counter!(MetricName::NormalizeRowsWritten.as_str(), "table" => table.to_string())
            .increment(count as u64);
    }

    pub fn rows_dropped(table: &str, count: usize) {
        ::metrics::counter!(MetricName::NormalizeRowsDropped.as_str(), "table" => table.to_string())
            .increment(count as u64);
    }
}

// ============================================================================
// Load Metrics
// ============================================================================

pub mod load {
    use super::MetricName;

    pub fn batch_accepted(collection: &str, rows: usize) {
        ::metrics::counter!(MetricName::LoadBatchesAccepted.as_str(), "collection" => collection.to_string())
            .increment(1);
        ::metrics::counter!(MetricName::LoadRowsAccepted.as_str(), "collection" => collection.to_string())
            .increment(rows as u64);
    }

    pub fn batch_failed(collection: &str) {
        ::metrics::counter!(MetricName::LoadBatchesFailed.as_str(), "collection" => collection.to_string())
            .increment(1);
    }

    pub fn batch_duration(collection: &str, secs: f64) {
        ::metrics::histogram!(MetricName::LoadBatchDuration.as_str(), "collection" => collection.to_string())
            .record(secs);
    }

    /// Freshness marker for dashboards
    pub fn run_finished() {
        let timestamp_secs = chrono::Utc::now().timestamp() as f64;
        ::metrics::gauge!(MetricName::LoadRunTimestamp.as_str()).set(timestamp_secs);
    }
}
