//! In-process counters, gauges and timing samples
//!
//! Everything lives in one [`MetricsRegistry`] behind [`metrics()`]; the CLI
//! dumps it with `--metrics` before exiting.

use crate::session_id;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

static REGISTRY: Lazy<MetricsRegistry> = Lazy::new(MetricsRegistry::new);

/// Metric names used by the station crates
pub mod names {
    pub const FRAMES_SENT: &str = "ble.frames_sent";
    pub const FRAMES_RECEIVED: &str = "ble.frames_received";
    pub const DECODE_ERRORS: &str = "ble.decode_errors";
    pub const QUERY_TIMEOUTS: &str = "ble.query_timeouts";
    pub const QUERY_RTT_MS: &str = "ble.query_rtt_ms";
    pub const CONNECT_MS: &str = "ble.connect_ms";
    pub const LOG_ENTRIES: &str = "log.entries";
    pub const LOG_INCOMPLETE: &str = "log.incomplete_entries";
    pub const LOG_SIZE: &str = "log.size_records";
    pub const STATIONS_FOUND: &str = "scan.stations_found";
    pub const BEST_RSSI: &str = "scan.best_rssi_dbm";
}

/// The process-wide registry
pub fn metrics() -> &'static MetricsRegistry {
    &REGISTRY
}

#[derive(Default)]
struct Store {
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, i64>,
    samples: BTreeMap<String, Vec<f64>>,
}

pub struct MetricsRegistry {
    started: Instant,
    store: Mutex<Store>,
}

impl MetricsRegistry {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            store: Mutex::new(Store::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn increment(&self, name: &str) {
        self.increment_by(name, 1);
    }

    pub fn increment_by(&self, name: &str, amount: u64) {
        let mut store = self.lock();
        match store.counters.get_mut(name) {
            Some(total) => *total += amount,
            None => {
                store.counters.insert(name.to_string(), amount);
            }
        }
    }

    /// 0 for a counter that was never touched
    pub fn counter(&self, name: &str) -> u64 {
        self.lock().counters.get(name).copied().unwrap_or(0)
    }

    /// Overwrite the last observed value
    pub fn gauge(&self, name: &str, value: i64) {
        self.lock().gauges.insert(name.to_string(), value);
    }

    pub fn gauge_value(&self, name: &str) -> Option<i64> {
        self.lock().gauges.get(name).copied()
    }

    /// Add one sample to a distribution
    pub fn histogram(&self, name: &str, value: f64) {
        self.lock().samples.entry(name.to_string()).or_default().push(value);
    }

    pub fn snapshot(&self) -> Snapshot {
        let store = self.lock();
        Snapshot {
            session_id: session_id().to_string(),
            uptime_secs: self.started.elapsed().as_secs(),
            counters: store.counters.clone(),
            gauges: store.gauges.clone(),
            histograms: store
                .samples
                .iter()
                .map(|(name, values)| (name.clone(), Summary::of(values)))
                .collect(),
        }
    }

    pub fn export_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or_default()
    }
}

/// Point-in-time copy of the registry
#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub session_id: String,
    pub uptime_secs: u64,
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, i64>,
    pub histograms: BTreeMap<String, Summary>,
}

/// Shape of a sample distribution
#[derive(Debug, Default, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
}

impl Summary {
    fn of(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
            return Self::default();
        };

        let count = sorted.len();
        Self {
            count,
            min,
            max,
            mean: sorted.iter().sum::<f64>() / count as f64,
            p50: nearest_rank(&sorted, 0.50),
            p95: nearest_rank(&sorted, 0.95),
        }
    }
}

/// `q`-quantile of non-empty sorted samples by the nearest-rank method.
fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Records elapsed milliseconds under `name` on [`Timer::stop`] or drop.
pub struct Timer {
    name: &'static str,
    started: Option<Instant>,
}

impl Timer {
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            started: Some(Instant::now()),
        }
    }

    pub fn stop(mut self) -> Duration {
        self.finish().unwrap_or_default()
    }

    /// Discard the measurement, e.g. for a failed request
    pub fn cancel(mut self) {
        self.started = None;
    }

    fn finish(&mut self) -> Option<Duration> {
        let elapsed = self.started.take()?.elapsed();
        metrics().histogram(self.name, elapsed.as_secs_f64() * 1000.0);
        tracing::trace!(metric = self.name, elapsed_ms = elapsed.as_millis() as u64, "timer stopped");
        Some(elapsed)
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let registry = MetricsRegistry::new();
        registry.increment("frames");
        registry.increment("frames");
        registry.increment_by("frames", 3);

        assert_eq!(registry.counter("frames"), 5);
        assert_eq!(registry.counter("missing"), 0);
    }

    #[test]
    fn test_gauge_keeps_last_value() {
        let registry = MetricsRegistry::new();
        registry.gauge("rssi", -80);
        registry.gauge("rssi", -52);

        assert_eq!(registry.gauge_value("rssi"), Some(-52));
        assert_eq!(registry.gauge_value("other"), None);
    }

    #[test]
    fn test_summary_of_samples() {
        let values: Vec<f64> = (1..=10).rev().map(f64::from).collect();
        let summary = Summary::of(&values);

        assert_eq!(summary.count, 10);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 10.0);
        assert_eq!(summary.mean, 5.5);
        assert_eq!(summary.p50, 5.0);
        assert_eq!(summary.p95, 10.0);
        assert_eq!(Summary::of(&[]), Summary::default());
    }

    #[test]
    fn test_snapshot_json_layout() {
        let registry = MetricsRegistry::new();
        registry.increment(names::FRAMES_SENT);
        registry.gauge(names::BEST_RSSI, -61);
        registry.histogram(names::QUERY_RTT_MS, 12.5);

        let json = registry.export_json();
        assert_eq!(json["counters"][names::FRAMES_SENT], 1);
        assert_eq!(json["gauges"][names::BEST_RSSI], -61);
        assert_eq!(json["histograms"][names::QUERY_RTT_MS]["count"], 1);
        assert_eq!(json["session_id"], session_id());
    }

    #[test]
    fn test_timer_records_once() {
        let timer = Timer::start("test.timer_once");
        std::thread::sleep(Duration::from_millis(5));
        assert!(timer.stop() >= Duration::from_millis(5));

        let json = metrics().export_json();
        assert_eq!(json["histograms"]["test.timer_once"]["count"], 1);
    }

    #[test]
    fn test_cancelled_timer_records_nothing() {
        Timer::start("test.timer_cancel").cancel();
        let json = metrics().export_json();
        assert!(json["histograms"].get("test.timer_cancel").is_none());
    }
}
