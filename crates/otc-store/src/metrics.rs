use metrics::{Counter, Histogram};

/// Store-level operational metrics, mirroring the teacher's
/// `db-rocks::metrics` module.
#[derive(Debug, Clone)]
pub struct StoreMetrics {
    pub deals_written: Counter,
    pub deposits_recorded: Counter,
    pub queue_items_written: Counter,
    pub write_latency: Histogram,
}

impl StoreMetrics {
    pub fn new() -> Self {
        Self {
            deals_written: metrics::counter!("otc_store_deals_written_total"),
            deposits_recorded: metrics::counter!("otc_store_deposits_recorded_total"),
            queue_items_written: metrics::counter!("otc_store_queue_items_written_total"),
            write_latency: metrics::histogram!("otc_store_write_latency_seconds"),
        }
    }

    pub fn record_write(&self, duration: std::time::Duration) {
        self.write_latency.record(duration.as_secs_f64());
    }
}

impl Default for StoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}
