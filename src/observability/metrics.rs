use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub transitions_total: IntCounterVec,
    pub claims_total: IntCounterVec,
    pub events_broadcast_total: IntCounterVec,
    pub ws_connections: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Order status transitions by outcome"),
            &["outcome"],
        )
        .expect("valid transitions_total metric");

        let claims_total = IntCounterVec::new(
            Opts::new("claims_total", "Delivery claims by outcome"),
            &["outcome"],
        )
        .expect("valid claims_total metric");

        let events_broadcast_total = IntCounterVec::new(
            Opts::new("events_broadcast_total", "Fan-out events by kind"),
            &["event"],
        )
        .expect("valid events_broadcast_total metric");

        let ws_connections = IntGauge::new(
            "ws_connections",
            "Currently connected realtime clients",
        )
        .expect("valid ws_connections metric");

        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(claims_total.clone()))
            .expect("register claims_total");
        registry
            .register(Box::new(events_broadcast_total.clone()))
            .expect("register events_broadcast_total");
        registry
            .register(Box::new(ws_connections.clone()))
            .expect("register ws_connections");

        Self {
            registry,
            transitions_total,
            claims_total,
            events_broadcast_total,
            ws_connections,
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
