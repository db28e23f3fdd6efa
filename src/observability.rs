use std::net::SocketAddr;

use crate::error::AvailabilityError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "stayledger_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "stayledger_http_request_duration_seconds";

/// Counter: availability mutations attempted. Labels: op, outcome.
pub const RANGE_MUTATIONS_TOTAL: &str = "stayledger_range_mutations_total";

/// Counter: inserts rejected because they overlap an existing range.
pub const OVERLAP_REJECTIONS_TOTAL: &str = "stayledger_overlap_rejections_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: registered properties that have not been deactivated.
pub const PROPERTIES_ACTIVE: &str = "stayledger_properties_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "stayledger_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "stayledger_wal_flush_batch_size";

/// Counter: WAL compactions. Labels: outcome.
pub const WAL_COMPACTIONS_TOTAL: &str = "stayledger_wal_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if `port` is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Short label for the outcome of a mutation.
pub fn outcome_label(result: &Result<(), &AvailabilityError>) -> &'static str {
    match result {
        Ok(()) => "ok",
        Err(AvailabilityError::InvalidRange(_)) => "invalid_range",
        Err(AvailabilityError::OverlapConflict { .. }) => "overlap",
        Err(AvailabilityError::RangeNotFound(_)) => "range_not_found",
        Err(AvailabilityError::Forbidden { .. }) => "forbidden",
        Err(AvailabilityError::PropertyNotFound(_)) => "property_not_found",
        Err(AvailabilityError::AlreadyExists(_)) => "already_exists",
        Err(AvailabilityError::InvalidSeason(_)) => "invalid_season",
        Err(AvailabilityError::SeasonOverlap(_)) => "season_overlap",
        Err(AvailabilityError::SeasonNotFound(_)) => "season_not_found",
        Err(AvailabilityError::LimitExceeded(_)) => "limit_exceeded",
        Err(AvailabilityError::Storage(_)) => "storage",
    }
}
