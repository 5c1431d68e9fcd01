use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// ============================================================================
// Metrics Module - Prometheus metrics for the workflow bridge
// ============================================================================
//
// Provides metrics for:
// - Engine calls (per port operation, outcome and latency)
// - Lifecycle message correlations (per message name and outcome)
// - Status projection invariant violations
// - Published domain events
//
// The registry is exposed so a hosting process can serve it on /metrics.
// ============================================================================

/// Central metrics registry for the workflow bridge
pub struct Metrics {
    registry: Registry,

    // Engine Port Metrics
    pub engine_calls_total: IntCounterVec,
    pub engine_call_duration: HistogramVec,

    // Correlation Metrics
    pub correlations_total: IntCounterVec,

    // Projection Metrics
    pub model_invariant_violations: IntCounter,

    // Domain Event Metrics
    pub domain_events_published: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let engine_calls_total = IntCounterVec::new(
            Opts::new("workflow_engine_calls_total", "Total calls made to the workflow engine"),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(engine_calls_total.clone()))?;

        let engine_call_duration = HistogramVec::new(
            HistogramOpts::new("workflow_engine_call_duration_seconds", "Workflow engine call duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["operation"],
        )?;
        registry.register(Box::new(engine_call_duration.clone()))?;

        let correlations_total = IntCounterVec::new(
            Opts::new("workflow_correlations_total", "Lifecycle messages correlated to process instances"),
            &["message_name", "outcome"],
        )?;
        registry.register(Box::new(correlations_total.clone()))?;

        let model_invariant_violations = IntCounter::new(
            "workflow_model_invariant_violations_total",
            "Status projections that found other than exactly one active activity",
        )?;
        registry.register(Box::new(model_invariant_violations.clone()))?;

        let domain_events_published = IntCounterVec::new(
            Opts::new("domain_events_published_total", "Domain events handed to the publisher"),
            &["event_type"],
        )?;
        registry.register(Box::new(domain_events_published.clone()))?;

        Ok(Self {
            registry,
            engine_calls_total,
            engine_call_duration,
            correlations_total,
            model_invariant_violations,
            domain_events_published,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record one engine call; `outcome` is "ok" or a WorkflowError kind
    pub fn record_engine_call(&self, operation: &str, duration_secs: f64, outcome: &str) {
        self.engine_calls_total.with_label_values(&[operation, outcome]).inc();
        self.engine_call_duration.with_label_values(&[operation]).observe(duration_secs);
    }

    pub fn record_correlation(&self, message_name: &str, outcome: &str) {
        self.correlations_total.with_label_values(&[message_name, outcome]).inc();
    }

    pub fn record_invariant_violation(&self) {
        self.model_invariant_violations.inc();
    }

    pub fn record_event_published(&self, event_type: &str) {
        self.domain_events_published.with_label_values(&[event_type]).inc();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
