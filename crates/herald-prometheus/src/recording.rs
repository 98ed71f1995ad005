// SPDX-FileCopyrightText: 2026 Herald Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; without an installed recorder every call is
//! a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Herald metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("herald_tasks_enqueued_total", "Relay tasks accepted into the queue");
    describe_counter!(
        "herald_tasks_finished_total",
        "Relay tasks that reached a terminal state, by outcome"
    );
    describe_counter!(
        "herald_rate_limited_total",
        "Send calls rejected with a rate-limit signal"
    );
    describe_counter!(
        "herald_dedup_suppressed_total",
        "Observed events dropped as duplicates"
    );
    describe_gauge!("herald_queue_depth", "Relay tasks waiting or in flight");
    describe_histogram!(
        "herald_send_latency_seconds",
        "Latency of a single copy/send call"
    );
}

/// Record a task entering the queue and the resulting depth.
pub fn record_enqueued(depth: usize) {
    metrics::counter!("herald_tasks_enqueued_total").increment(1);
    metrics::gauge!("herald_queue_depth").set(depth as f64);
}

/// Record a task reaching a terminal state.
pub fn record_finished(outcome: &'static str, depth: usize) {
    metrics::counter!("herald_tasks_finished_total", "outcome" => outcome).increment(1);
    metrics::gauge!("herald_queue_depth").set(depth as f64);
}

/// Record a rate-limit signal from an account.
pub fn record_rate_limited(account: &str) {
    metrics::counter!("herald_rate_limited_total", "account" => account.to_string()).increment(1);
}

/// Record an event suppressed by the dedup table.
pub fn record_dedup_suppressed() {
    metrics::counter!("herald_dedup_suppressed_total").increment(1);
}

/// Record the latency of one copy/send call.
pub fn record_send_latency(kind: &'static str, seconds: f64) {
    metrics::histogram!("herald_send_latency_seconds", "kind" => kind).record(seconds);
}
