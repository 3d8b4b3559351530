use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tracing::error;

pub const METRIC_NAME: &str = "geth_peer_count";
pub const METRIC_HELP: &str = "Number of connected peers";
pub const CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

pub type MetricsStore = Arc<PeerMetrics>;

/// Registry owning the peer count gauge.
///
/// The gauge is a single atomic cell, so scrapes never observe a torn value
/// while the poller is writing. It starts at zero and is only ever overwritten
/// by a successful poll.
pub struct PeerMetrics {
    registry: Registry,
    peer_count: Gauge<f64, AtomicU64>,
}

impl PeerMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let peer_count = Gauge::<f64, AtomicU64>::default();
        registry.register(METRIC_NAME, METRIC_HELP, peer_count.clone());
        Self {
            registry,
            peer_count,
        }
    }

    pub fn set_peer_count(&self, count: usize) {
        self.peer_count.set(count as f64);
    }

    pub fn peer_count(&self) -> f64 {
        self.peer_count.get()
    }

    /// Render the registry in the text exposition format.
    pub fn export_text(&self) -> String {
        let mut buffer = String::new();
        if let Err(e) = encode(&mut buffer, &self.registry) {
            // writing into a String cannot fail, keep whatever was rendered
            error!("Failed to encode metrics: {}", e);
        }
        buffer
    }
}

impl Default for PeerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

pub fn new_store() -> MetricsStore {
    Arc::new(PeerMetrics::new())
}

#[cfg(test)]
pub(crate) fn sample_value(text: &str) -> f64 {
    let samples: Vec<&str> = text
        .lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| line.starts_with(METRIC_NAME))
        .collect();
    assert_eq!(samples.len(), 1, "expected exactly one sample in:\n{}", text);

    let mut parts = samples[0].split_whitespace();
    assert_eq!(parts.next(), Some(METRIC_NAME));
    let value = parts.next().expect("sample value").parse::<f64>().unwrap();
    assert_eq!(parts.next(), None);
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn starts_at_zero() {
        let metrics = PeerMetrics::new();
        assert_eq!(metrics.peer_count(), 0.0);
        assert_eq!(sample_value(&metrics.export_text()), 0.0);
    }

    #[test]
    fn export_contains_gauge_metadata() {
        let metrics = PeerMetrics::new();
        metrics.set_peer_count(7);
        let text = metrics.export_text();

        assert!(text.contains(&format!("# HELP {} {}", METRIC_NAME, METRIC_HELP)));
        assert!(text.contains(&format!("# TYPE {} gauge", METRIC_NAME)));
        assert!(text.trim_end().ends_with("# EOF"));
        assert_eq!(sample_value(&text), 7.0);
    }

    #[test]
    fn set_overwrites_previous_value() {
        let metrics = PeerMetrics::new();
        metrics.set_peer_count(12);
        metrics.set_peer_count(3);
        assert_eq!(metrics.peer_count(), 3.0);
        metrics.set_peer_count(0);
        assert_eq!(sample_value(&metrics.export_text()), 0.0);
    }

    #[test]
    fn concurrent_scrapes_see_committed_values() {
        let metrics = new_store();
        let old = 5usize;
        let new = 1_000_000_007usize;
        metrics.set_peer_count(old);

        let writer = {
            let metrics = metrics.clone();
            thread::spawn(move || {
                for i in 0..10_000 {
                    metrics.set_peer_count(if i % 2 == 0 { new } else { old });
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let metrics = metrics.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        let value = sample_value(&metrics.export_text());
                        assert!(
                            value == old as f64 || value == new as f64,
                            "observed torn value {}",
                            value
                        );
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
