//! Prometheus text exposition format.
//!
//! Renders a scheduler stats snapshot for scraping by a Prometheus server
//! or compatible agent.

use std::fmt::Write;

use baton_scheduler::SchedulerStats;

fn metric(out: &mut String, name: &str, kind: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
    let _ = writeln!(out, "{name} {value}");
}

/// Render one stats snapshot into Prometheus text format.
pub fn render_prometheus(stats: &SchedulerStats) -> String {
    let mut out = String::new();

    metric(
        &mut out,
        "baton_grants_total",
        "counter",
        "Sessions granted control.",
        stats.grants,
    );
    metric(
        &mut out,
        "baton_releases_total",
        "counter",
        "Sessions that released control voluntarily.",
        stats.releases,
    );
    metric(
        &mut out,
        "baton_expirations_total",
        "counter",
        "Active sessions ended by an exhausted budget.",
        stats.expirations,
    );
    metric(
        &mut out,
        "baton_liveness_evictions_total",
        "counter",
        "Active sessions ended by missing heartbeats.",
        stats.liveness_evictions,
    );
    metric(
        &mut out,
        "baton_queue_collections_total",
        "counter",
        "Queued sessions dropped for missing heartbeats.",
        stats.queue_collections,
    );
    metric(
        &mut out,
        "baton_active_sessions",
        "gauge",
        "Sessions currently in control (0 or 1).",
        stats.active,
    );
    metric(
        &mut out,
        "baton_queued_sessions",
        "gauge",
        "Sessions waiting for control.",
        stats.queued,
    );

    out
}
