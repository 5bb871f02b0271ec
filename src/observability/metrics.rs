//! Prometheus metrics for ingestion runs and the read API.
//!
//! Recording is a no-op until `init` installs a recorder, so the use cases
//! can call these helpers unconditionally (tests included).

use std::fmt;
use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

/// All metric names used in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    IngestRuns,
    IngestPayloadBytes,
    IngestDuration,
    ApiRequests,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::IngestRuns => "weather_ingest_runs_total",
            MetricName::IngestPayloadBytes => "weather_ingest_payload_bytes",
            MetricName::IngestDuration => "weather_ingest_duration_seconds",
            MetricName::ApiRequests => "weather_api_requests_total",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            MetricName::IngestRuns => "Ingestion runs by outcome",
            MetricName::IngestPayloadBytes => "Size of stored upstream payloads",
            MetricName::IngestDuration => "Wall time of completed ingestion runs",
            MetricName::ApiRequests => "Read API requests by route and status",
        }
    }

    pub fn all() -> [MetricName; 4] {
        [
            MetricName::IngestRuns,
            MetricName::IngestPayloadBytes,
            MetricName::IngestDuration,
            MetricName::ApiRequests,
        ]
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static INIT: Once = Once::new();

/// Installs the Prometheus exporter listening on `listen`. Idempotent; an
/// unparsable address only logs a warning.
pub fn init(listen: Option<&str>) {
    let Some(listen) = listen else {
        return;
    };
    INIT.call_once(|| {
        let addr: SocketAddr = match listen.parse() {
            Ok(addr) => addr,
            Err(e) => {
                warn!(listen, error = %e, "invalid metrics address, exporter disabled");
                return;
            }
        };
        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => {
                for name in MetricName::all() {
                    match name {
                        MetricName::IngestRuns | MetricName::ApiRequests => {
                            ::metrics::describe_counter!(name.as_str(), name.help())
                        }
                        MetricName::IngestPayloadBytes | MetricName::IngestDuration => {
                            ::metrics::describe_histogram!(name.as_str(), name.help())
                        }
                    }
                }
                info!("Prometheus exporter listening on http://{}/metrics", addr);
            }
            Err(e) => warn!(error = %e, "failed to install Prometheus exporter"),
        }
    });
}

pub mod ingest {
    use super::MetricName;

    pub fn run_success() {
        ::metrics::counter!(MetricName::IngestRuns.as_str(), "outcome" => "success").increment(1);
    }

    /// Upstream answered with a non-2xx status; payload and record were still written.
    pub fn run_upstream_failed() {
        ::metrics::counter!(MetricName::IngestRuns.as_str(), "outcome" => "upstream_failed")
            .increment(1);
    }

    /// The run aborted at `stage`.
    pub fn run_error(stage: &'static str) {
        ::metrics::counter!(MetricName::IngestRuns.as_str(), "outcome" => "error", "stage" => stage)
            .increment(1);
    }

    pub fn payload_bytes(bytes: usize) {
        ::metrics::histogram!(MetricName::IngestPayloadBytes.as_str()).record(bytes as f64);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::IngestDuration.as_str()).record(secs);
    }
}

pub mod api {
    use super::MetricName;

    pub fn request(route: &'static str, status: u16) {
        ::metrics::counter!(
            MetricName::ApiRequests.as_str(),
            "route" => route,
            "status" => status.to_string()
        )
        .increment(1);
    }
}
