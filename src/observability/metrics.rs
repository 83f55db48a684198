use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub orders_created_total: IntCounter,
    pub assignments_total: IntCounterVec,
    pub deliveries_total: IntCounterVec,
    pub workflow_latency_seconds: HistogramVec,
    pub cache_errors_total: IntCounterVec,
    pub driver_load_ratio: GaugeVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let orders_created_total =
            IntCounter::new("orders_created_total", "Orders accepted and persisted")?;

        let assignments_total = IntCounterVec::new(
            Opts::new("assignments_total", "Route assignments by outcome"),
            &["outcome"],
        )?;

        let deliveries_total = IntCounterVec::new(
            Opts::new("deliveries_total", "Delivery completions by outcome"),
            &["outcome"],
        )?;

        let workflow_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "workflow_latency_seconds",
                "Latency of order workflows in seconds",
            ),
            &["workflow", "outcome"],
        )?;

        let cache_errors_total = IntCounterVec::new(
            Opts::new("cache_errors_total", "Cache operations that failed"),
            &["operation"],
        )?;

        let driver_load_ratio = GaugeVec::new(
            Opts::new("driver_load_ratio", "Assigned weight over vehicle capacity [0..1]"),
            &["driver_id"],
        )?;

        registry.register(Box::new(orders_created_total.clone()))?;
        registry.register(Box::new(assignments_total.clone()))?;
        registry.register(Box::new(deliveries_total.clone()))?;
        registry.register(Box::new(workflow_latency_seconds.clone()))?;
        registry.register(Box::new(cache_errors_total.clone()))?;
        registry.register(Box::new(driver_load_ratio.clone()))?;

        Ok(Self {
            registry,
            orders_created_total,
            assignments_total,
            deliveries_total,
            workflow_latency_seconds,
            cache_errors_total,
            driver_load_ratio,
        })
    }

    pub fn observe_workflow(&self, workflow: &str, outcome: &str, elapsed_secs: f64) {
        self.workflow_latency_seconds
            .with_label_values(&[workflow, outcome])
            .observe(elapsed_secs);
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
