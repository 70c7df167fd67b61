use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub const BUNDLES_RECEIVED: &str = "yac.bundles.received";
pub const BUNDLES_DROPPED: &str = "yac.bundles.dropped";
pub const VOTES_DUPLICATE: &str = "yac.votes.duplicate";
pub const VOTES_EQUIVOCATION: &str = "yac.votes.equivocation";
pub const SEND_FAILED: &str = "yac.send.failed";
pub const OUTCOMES_COMMIT: &str = "yac.outcomes.commit";
pub const OUTCOMES_REJECT: &str = "yac.outcomes.reject";
pub const OUTCOMES_NOTHING: &str = "yac.outcomes.nothing";
pub const OUTCOMES_FUTURE: &str = "yac.outcomes.future";

/// Metrics registry (simple, Prometheus-style)
#[derive(Clone)]
pub struct MetricsRegistry {
    counters: Arc<Mutex<HashMap<String, u64>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn inc_counter(&self, name: &str) {
        self.add_counter(name, 1);
    }

    pub fn add_counter(&self, name: &str, n: u64) {
        let mut counters = self.counters.lock();
        *counters.entry(name.to_string()).or_insert(0) += n;
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.counters.lock().clone()
    }

    /// Counters as a JSON object with sorted keys, for log lines
    pub fn to_json(&self) -> serde_json::Value {
        let sorted: BTreeMap<String, u64> = self.snapshot().into_iter().collect();
        serde_json::json!(sorted)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

lazy_static! {
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
}
