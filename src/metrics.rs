//! Prometheus metrics for deployments, the relay and fee collection
//!
//! One process-wide registry, rendered by the relay server on `GET /metrics`.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Instant;

/// Global metrics registry
pub struct Metrics {
    registry: Registry,

    // Deployment workflow
    pub deployments_started: IntCounter,
    pub deployments_completed: IntCounter,
    pub deployments_aborted: IntCounterVec,

    // Metadata relay
    pub relay_requests: IntCounterVec,
    pub ledger_appends: IntCounter,

    // Fee collection, labelled by outcome
    pub fee_collections: IntCounterVec,

    // Histograms
    pub confirmation_latency: Histogram,
    pub rpc_latency: Histogram,
}

impl Metrics {
    /// Create new metrics instance
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let deployments_started = IntCounter::with_opts(Opts::new(
            "deployments_started_total",
            "Number of deployment workflows started",
        ))?;

        let deployments_completed = IntCounter::with_opts(Opts::new(
            "deployments_completed_total",
            "Number of deployment workflows that reached the initial mint",
        ))?;

        let deployments_aborted = IntCounterVec::new(
            Opts::new(
                "deployments_aborted_total",
                "Deployment workflows aborted, by the stage that failed",
            ),
            &["stage"],
        )?;

        let relay_requests = IntCounterVec::new(
            Opts::new("relay_requests_total", "Metadata relay requests by outcome"),
            &["outcome"],
        )?;

        let ledger_appends = IntCounter::with_opts(Opts::new(
            "ledger_appends_total",
            "Entries appended to the deployed token ledger",
        ))?;

        let fee_collections = IntCounterVec::new(
            Opts::new("fee_collections_total", "Per-mint fee collection outcomes"),
            &["outcome"],
        )?;

        let confirmation_latency = Histogram::with_opts(
            HistogramOpts::new(
                "confirmation_latency_seconds",
                "Time from submission to requested commitment",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        )?;

        let rpc_latency = Histogram::with_opts(
            HistogramOpts::new("rpc_latency_seconds", "RPC call latency")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;

        // Register all metrics
        registry.register(Box::new(deployments_started.clone()))?;
        registry.register(Box::new(deployments_completed.clone()))?;
        registry.register(Box::new(deployments_aborted.clone()))?;
        registry.register(Box::new(relay_requests.clone()))?;
        registry.register(Box::new(ledger_appends.clone()))?;
        registry.register(Box::new(fee_collections.clone()))?;
        registry.register(Box::new(confirmation_latency.clone()))?;
        registry.register(Box::new(rpc_latency.clone()))?;

        Ok(Self {
            registry,
            deployments_started,
            deployments_completed,
            deployments_aborted,
            relay_requests,
            ledger_appends,
            fee_collections,
            confirmation_latency,
            rpc_latency,
        })
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// Global metrics instance
pub fn metrics() -> &'static Metrics {
    static METRICS: once_cell::sync::Lazy<Metrics> =
        once_cell::sync::Lazy::new(|| Metrics::new().expect("Failed to initialize metrics"));
    &METRICS
}

/// Timer helper for measuring operation duration
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_render_contains_counters() {
        let m = Metrics::new().unwrap();
        m.deployments_started.inc();
        m.relay_requests.with_label_values(&["ok"]).inc();

        let text = m.render().unwrap();
        assert!(text.contains("deployments_started_total 1"));
        assert!(text.contains("relay_requests_total{outcome=\"ok\"} 1"));
    }

    #[test]
    fn test_timer_observes() {
        let m = Metrics::new().unwrap();
        let timer = Timer::new();
        timer.observe_duration(&m.confirmation_latency);
        assert_eq!(m.confirmation_latency.get_sample_count(), 1);
    }
}
