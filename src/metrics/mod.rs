use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Covers:
// - notification persistence and live delivery per channel
// - order transitions and assignment conflicts
// - vehicle alerts and maintenance scan timing
// - connected push clients
//
// Everything is registered on a private registry rendered at /metrics.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Notification Bus
    pub notifications_persisted: IntCounterVec,
    pub notification_persist_failures: IntCounter,
    pub live_deliveries: IntCounterVec,
    pub live_drops: IntCounterVec,

    // Lifecycle
    pub order_transitions: IntCounterVec,
    pub assignment_conflicts: IntCounter,
    pub vehicle_alerts: IntCounterVec,
    pub maintenance_scan_duration: Histogram,

    // Push transport
    pub push_clients: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let notifications_persisted = IntCounterVec::new(
            Opts::new("notifications_persisted_total", "Notifications written to the store"),
            &["type"],
        )?;
        registry.register(Box::new(notifications_persisted.clone()))?;

        let notification_persist_failures = IntCounter::new(
            "notification_persist_failures_total",
            "Notifications that could not be persisted",
        )?;
        registry.register(Box::new(notification_persist_failures.clone()))?;

        let live_deliveries = IntCounterVec::new(
            Opts::new("live_deliveries_total", "Events handed to a live channel"),
            &["channel"],
        )?;
        registry.register(Box::new(live_deliveries.clone()))?;

        let live_drops = IntCounterVec::new(
            Opts::new("live_drops_total", "Events dropped by a live channel"),
            &["channel"],
        )?;
        registry.register(Box::new(live_drops.clone()))?;

        let order_transitions = IntCounterVec::new(
            Opts::new("order_transitions_total", "Applied order status transitions"),
            &["to_status"],
        )?;
        registry.register(Box::new(order_transitions.clone()))?;

        let assignment_conflicts = IntCounter::new(
            "assignment_conflicts_total",
            "Assignments rejected because the vehicle was not available",
        )?;
        registry.register(Box::new(assignment_conflicts.clone()))?;

        let vehicle_alerts = IntCounterVec::new(
            Opts::new("vehicle_alerts_total", "Threshold alerts raised for vehicles"),
            &["kind"],
        )?;
        registry.register(Box::new(vehicle_alerts.clone()))?;

        let maintenance_scan_duration = Histogram::with_opts(
            HistogramOpts::new("maintenance_scan_duration_seconds", "Maintenance scan duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(maintenance_scan_duration.clone()))?;

        let push_clients = IntGauge::new("push_clients_connected", "Connected push clients")?;
        registry.register(Box::new(push_clients.clone()))?;

        Ok(Self {
            registry,
            notifications_persisted,
            notification_persist_failures,
            live_deliveries,
            live_drops,
            order_transitions,
            assignment_conflicts,
            vehicle_alerts,
            maintenance_scan_duration,
            push_clients,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition format for scraping.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn record_notification(&self, kind: &str) {
        self.notifications_persisted.with_label_values(&[kind]).inc();
    }

    pub fn record_delivery(&self, channel: &str, delivered: u64, dropped: u64) {
        self.live_deliveries.with_label_values(&[channel]).inc_by(delivered);
        self.live_drops.with_label_values(&[channel]).inc_by(dropped);
    }

    pub fn record_transition(&self, to_status: &str) {
        self.order_transitions.with_label_values(&[to_status]).inc();
    }

    pub fn record_alert(&self, kind: &str) {
        self.vehicle_alerts.with_label_values(&[kind]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_delivery_counts_by_channel() {
        let metrics = Metrics::new().unwrap();
        metrics.record_delivery("push", 3, 1);
        metrics.record_delivery("push", 2, 0);

        let text = metrics.render().unwrap();
        assert!(text.contains("live_deliveries_total{channel=\"push\"} 5"));
        assert!(text.contains("live_drops_total{channel=\"push\"} 1"));
    }

    #[test]
    fn test_render_contains_registered_names() {
        let metrics = Metrics::new().unwrap();
        metrics.record_alert("low_fuel");
        metrics.record_transition("delivered");

        let text = metrics.render().unwrap();
        assert!(text.contains("vehicle_alerts_total"));
        assert!(text.contains("order_transitions_total{to_status=\"delivered\"} 1"));
    }
}
