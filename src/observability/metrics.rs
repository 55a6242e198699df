//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ledger_proposals_total` (counter): proposals dispatched, by kind
//! - `ledger_endorsements_total` (counter): peer answers, by status
//! - `ledger_commits_total` (counter): commit coordinator outcomes
//! - `ledger_commit_duration_seconds` (histogram): broadcast to commit event
//! - `ledger_http_requests_total` (counter): gateway requests, by route and status

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// `kind` is `transaction` or `query`.
pub fn record_proposal(kind: &'static str) {
    metrics::counter!("ledger_proposals_total", "kind" => kind).increment(1);
}

pub fn record_endorsement(success: bool) {
    let status = if success { "success" } else { "failure" };
    metrics::counter!("ledger_endorsements_total", "status" => status).increment(1);
}

pub fn record_commit(outcome: &'static str, started: Instant) {
    metrics::counter!("ledger_commits_total", "outcome" => outcome).increment(1);
    metrics::histogram!("ledger_commit_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_request(route: &'static str, status: u16) {
    metrics::counter!(
        "ledger_http_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
}
