//! # Prometheus Metrics — Exposition for Container Orchestration
//!
//! Exposes brainbet operational metrics in the Prometheus text exposition format.
//!
//! ## Metrics Exposed
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `brainbet_timer_transitions_total` | Counter | `transition` | Successful timer transitions |
//! | `brainbet_timer_rejections_total` | Counter | `kind` | Requests rejected (conflict, validation, auth) |
//! | `brainbet_coins_awarded_cents_total` | Counter | — | Coins credited to wallets, in hundredths |
//! | `brainbet_sessions_invalidated_total` | Counter | — | Finished sessions that failed an attention check |
//! | `brainbet_http_request_duration_seconds` | Histogram | `method`, `path` | Request latency |
//!
//! Counters are bumped by request handlers after the transaction commits.
//! The `/metrics` endpoint renders the current registry state on each scrape.

use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, prometheus_client::encoding::EncodeLabelSet)]
pub struct TransitionLabel {
    pub transition: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, prometheus_client::encoding::EncodeLabelSet)]
pub struct RejectionLabel {
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, prometheus_client::encoding::EncodeLabelSet)]
pub struct HttpLabel {
    pub method: String,
    pub path: String,
}

fn request_histogram() -> Histogram {
    Histogram::new(exponential_buckets(0.001, 2.0, 14))
}

/// Thread-safe metrics registry for the timer service.
pub struct Metrics {
    pub registry: Registry,
    pub timer_transitions: Family<TransitionLabel, Counter>,
    pub timer_rejections: Family<RejectionLabel, Counter>,
    pub coins_awarded_cents: Counter,
    pub sessions_invalidated: Counter,
    pub http_request_duration: Family<HttpLabel, Histogram, fn() -> Histogram>,
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let timer_transitions = Family::<TransitionLabel, Counter>::default();
        registry.register(
            "brainbet_timer_transitions",
            "Successful timer transitions by kind",
            timer_transitions.clone(),
        );

        let timer_rejections = Family::<RejectionLabel, Counter>::default();
        registry.register(
            "brainbet_timer_rejections",
            "Timer requests rejected by error kind",
            timer_rejections.clone(),
        );

        let coins_awarded_cents = Counter::default();
        registry.register(
            "brainbet_coins_awarded_cents",
            "Coins credited to wallets, in hundredths",
            coins_awarded_cents.clone(),
        );

        let sessions_invalidated = Counter::default();
        registry.register(
            "brainbet_sessions_invalidated",
            "Finished sessions that failed an attention check",
            sessions_invalidated.clone(),
        );

        let http_request_duration =
            Family::<HttpLabel, Histogram, fn() -> Histogram>::new_with_constructor(
                request_histogram,
            );
        registry.register(
            "brainbet_http_request_duration_seconds",
            "HTTP request latency",
            http_request_duration.clone(),
        );

        Self {
            registry,
            timer_transitions,
            timer_rejections,
            coins_awarded_cents,
            sessions_invalidated,
            http_request_duration,
        }
    }

    pub fn record_transition(&self, transition: &str) {
        self.timer_transitions
            .get_or_create(&TransitionLabel {
                transition: transition.to_string(),
            })
            .inc();
    }

    pub fn record_rejection(&self, kind: &str) {
        self.timer_rejections
            .get_or_create(&RejectionLabel {
                kind: kind.to_string(),
            })
            .inc();
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> String {
        let mut buf = String::new();
        // Writing into a String cannot fail.
        let _ = encode(&mut buf, &self.registry);
        buf
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
