// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request counters in Prometheus format.
//!
//! Each [`Metrics`] owns its own recorder, so two states in one process never
//! share counts. Handles are registered once through the `metrics` macros and
//! updated lock-free on the hot path.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use metrics::{Counter, Gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::ErrorRecord;

pub const REQUESTS_TOTAL: &str = "http_requests_total";
pub const ERRORS_TOTAL: &str = "http_errors_total";
pub const PANICS_TOTAL: &str = "http_panics_total";
pub const IN_FLIGHT: &str = "http_requests_in_flight";

pub struct Metrics {
    handle: PrometheusHandle,
    requests: Counter,
    errors: Counter,
    panics: Counter,
    in_flight: Gauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        let (requests, errors, panics, in_flight) = metrics::with_local_recorder(&recorder, || {
            metrics::describe_counter!(REQUESTS_TOTAL, "Requests that entered the metrics stage");
            metrics::describe_counter!(ERRORS_TOTAL, "Requests answered with a translated error");
            metrics::describe_counter!(PANICS_TOTAL, "Handler panics contained by the panic guard");
            metrics::describe_gauge!(IN_FLIGHT, "Requests currently being processed");
            (
                metrics::counter!(REQUESTS_TOTAL),
                metrics::counter!(ERRORS_TOTAL),
                metrics::counter!(PANICS_TOTAL),
                metrics::gauge!(IN_FLIGHT),
            )
        });

        Self {
            handle,
            requests,
            errors,
            panics,
            in_flight,
        }
    }

    pub fn record_panic(&self) {
        self.panics.increment(1);
    }

    /// Prometheus text exposition of every counter.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Current value of one unlabelled series, read back from the exposition.
    #[cfg(test)]
    pub(crate) fn value(&self, name: &str) -> f64 {
        self.render()
            .lines()
            .filter(|line| !line.starts_with('#'))
            .find_map(|line| {
                let (series, value) = line.split_once(' ')?;
                (series == name).then(|| value.trim().parse().ok()).flatten()
            })
            .unwrap_or(0.0)
    }
}

/// Decrements the in-flight gauge on drop, including during unwinding.
struct InFlight<'a>(&'a Metrics);

impl<'a> InFlight<'a> {
    fn enter(metrics: &'a Metrics) -> Self {
        metrics.in_flight.increment(1.0);
        Self(metrics)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.decrement(1.0);
    }
}

/// Metrics stage.
pub async fn track(State(metrics): State<Arc<Metrics>>, request: Request, next: Next) -> Response {
    metrics.requests.increment(1);
    let _in_flight = InFlight::enter(&metrics);

    let response = next.run(request).await;
    if response.extensions().get::<ErrorRecord>().is_some() {
        metrics.errors.increment(1);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_guard_balances() {
        let metrics = Metrics::new();
        {
            let _a = InFlight::enter(&metrics);
            let _b = InFlight::enter(&metrics);
            assert_eq!(metrics.value(IN_FLIGHT), 2.0);
        }
        assert_eq!(metrics.value(IN_FLIGHT), 0.0);
    }

    #[test]
    fn in_flight_guard_survives_unwinding() {
        let metrics = Metrics::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = InFlight::enter(&metrics);
            panic!("boom");
        }));

        assert!(result.is_err());
        assert_eq!(metrics.value(IN_FLIGHT), 0.0);
    }

    #[test]
    fn render_exposes_every_series() {
        let metrics = Metrics::new();
        metrics.record_panic();

        let text = metrics.render();
        for name in [REQUESTS_TOTAL, ERRORS_TOTAL, PANICS_TOTAL, IN_FLIGHT] {
            assert!(text.contains(&format!("# TYPE {name}")), "{name} missing:\n{text}");
        }
        assert_eq!(metrics.value(PANICS_TOTAL), 1.0);
    }

    #[test]
    fn recorders_are_isolated() {
        let a = Metrics::new();
        let b = Metrics::new();
        a.record_panic();

        assert_eq!(a.value(PANICS_TOTAL), 1.0);
        assert_eq!(b.value(PANICS_TOTAL), 0.0);
    }
}
