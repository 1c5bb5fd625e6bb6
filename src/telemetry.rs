use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub enable_audit: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        let audit = std::env::var("TOMBLITE_AUDIT")
            .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        Self { enable_audit: audit }
    }
}

#[derive(Default)]
pub struct Metrics {
    pub queries_total: AtomicU64,
    pub writes_total: AtomicU64,
    pub audits_total: AtomicU64,
}

#[derive(Default)]
pub struct Telemetry {
    pub cfg: RwLock<TelemetryConfig>,
    pub metrics: Metrics,
    // For tests we can capture audit lines in-memory
    audit_sink: RwLock<Option<Arc<RwLock<Vec<String>>>>>,
}

pub(crate) static TELEMETRY: std::sync::LazyLock<Telemetry> =
    std::sync::LazyLock::new(Telemetry::default);

pub fn set_audit_enabled(enabled: bool) {
    TELEMETRY.cfg.write().enable_audit = enabled;
}

pub fn set_audit_sink_for_tests(sink: Arc<RwLock<Vec<String>>>) {
    *TELEMETRY.audit_sink.write() = Some(sink);
}

fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Counts one read-side operation (find, count, distinct, aggregate).
pub fn record_query() {
    TELEMETRY.metrics.queries_total.fetch_add(1, Ordering::Relaxed);
}

/// Counts a write and, when auditing is on, emits one structured line per
/// mutated document on the `tomblite::audit` target.
pub fn log_audit(op: &str, collection: &str, doc_id: &str) {
    TELEMETRY.metrics.writes_total.fetch_add(1, Ordering::Relaxed);
    if !TELEMETRY.cfg.read().enable_audit {
        return;
    }
    TELEMETRY.metrics.audits_total.fetch_add(1, Ordering::Relaxed);
    let line = serde_json::json!({
        "ts": now_ts(), "op": op, "collection": collection, "doc_id": doc_id
    })
    .to_string();
    let sink = TELEMETRY.audit_sink.read().clone();
    if let Some(sink) = sink {
        sink.write().push(line.clone());
    }
    log::info!(target: "tomblite::audit", "{line}");
}

#[must_use]
pub fn metrics_text() -> String {
    // OpenMetrics/Prometheus exposition format (no types/HELP for brevity)
    let m = &TELEMETRY.metrics;
    format!(
        "tomblite_queries_total {}\n\
         tomblite_writes_total {}\n\
         tomblite_audits_total {}\n",
        m.queries_total.load(Ordering::Relaxed),
        m.writes_total.load(Ordering::Relaxed),
        m.audits_total.load(Ordering::Relaxed),
    )
}
