use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub bookings_total: IntCounterVec,
    pub donations_created_total: IntCounter,
    pub nearby_queries_total: IntCounterVec,
    pub active_subscriptions: IntGauge,
    pub match_latency_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let bookings_total = IntCounterVec::new(
            Opts::new("bookings_total", "Booking attempts by outcome"),
            &["outcome"],
        )
        .expect("valid bookings_total metric");

        let donations_created_total =
            IntCounter::new("donations_created_total", "Donations posted by donors")
                .expect("valid donations_created_total metric");

        let nearby_queries_total = IntCounterVec::new(
            Opts::new("nearby_queries_total", "Nearby donation lookups by delivery mode"),
            &["mode"],
        )
        .expect("valid nearby_queries_total metric");

        let active_subscriptions =
            IntGauge::new("active_subscriptions", "Open live nearby-donation feeds")
                .expect("valid active_subscriptions metric");

        let match_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "match_latency_seconds",
            "Latency of point-in-time nearby matching in seconds",
        ))
        .expect("valid match_latency_seconds metric");

        registry
            .register(Box::new(bookings_total.clone()))
            .expect("register bookings_total");
        registry
            .register(Box::new(donations_created_total.clone()))
            .expect("register donations_created_total");
        registry
            .register(Box::new(nearby_queries_total.clone()))
            .expect("register nearby_queries_total");
        registry
            .register(Box::new(active_subscriptions.clone()))
            .expect("register active_subscriptions");
        registry
            .register(Box::new(match_latency_seconds.clone()))
            .expect("register match_latency_seconds");

        Self {
            registry,
            bookings_total,
            donations_created_total,
            nearby_queries_total,
            active_subscriptions,
            match_latency_seconds,
        }
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

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
