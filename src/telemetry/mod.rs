//! Session telemetry collector.
//!
//! The collector stamps lifecycle events with a [`TimeSource`] and fans them
//! out through a bounded history plus an async broadcast stream.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::engine::backend::{SystemTimeSource, TimeSource};

pub mod events;

pub use events::{TelemetryEvent, TelemetryEventKind};

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<TelemetryEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
}

/// Broadcast-based collector retaining a bounded history of events.
pub struct TelemetryCollector {
    tx: broadcast::Sender<TelemetryEvent>,
    history: Mutex<VecDeque<TelemetryEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
    time_source: Arc<dyn TimeSource>,
    start_instant: Instant,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize, time_source: Arc<dyn TimeSource>) -> Self {
        let (tx, _) = broadcast::channel(buffer.max(1));
        let start_instant = time_source.now();
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
            time_source,
            start_instant,
        }
    }

    /// Stamp and publish an event.
    pub fn record(&self, kind: TelemetryEventKind, detail: Option<String>) {
        let timestamp_ms = self
            .time_source
            .now()
            .saturating_duration_since(self.start_instant)
            .as_millis() as u64;
        self.publish(TelemetryEvent {
            timestamp_ms,
            kind,
            detail,
        });
    }

    pub fn publish(&self, event: TelemetryEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        if self.history_capacity > 0 {
            if let Ok(mut history) = self.history.lock() {
                if history.len() == self.history_capacity {
                    history.pop_front();
                    self.dropped_history.fetch_add(1, Ordering::Relaxed);
                }
                history.push_back(event.clone());
            }
        }

        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let recent = self
            .history
            .lock()
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default();
        TelemetrySnapshot {
            recent,
            total_events: self.total_events.load(Ordering::Relaxed),
            dropped_events: self.dropped_history.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64, Arc::new(SystemTimeSource::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::StubTimeSource;

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3, Arc::new(StubTimeSource::new()));
        collector.record(
            TelemetryEventKind::SessionStarted {
                exercise_id: "c-major-scale".to_string(),
            },
            None,
        );
        collector.record(TelemetryEventKind::Warning, Some("late buffer".to_string()));
        collector.record(
            TelemetryEventKind::SampleRateAdjusted {
                from_hz: 44100,
                to_hz: 48000,
            },
            None,
        );

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 3);
        assert!(matches!(
            snapshot.recent[0].kind,
            TelemetryEventKind::SessionStarted { .. }
        ));
        assert_eq!(snapshot.recent[1].detail.as_deref(), Some("late buffer"));
        assert!(matches!(
            snapshot.recent[2].kind,
            TelemetryEventKind::SampleRateAdjusted { to_hz: 48000, .. }
        ));
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(8, 2, Arc::new(StubTimeSource::new()));
        for _ in 0..3 {
            collector.record(TelemetryEventKind::Warning, None);
        }

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent.len(), 2);
        assert_eq!(snapshot.total_events, 3);
        assert_eq!(snapshot.dropped_events, 1);
    }

    #[test]
    fn timestamps_follow_time_source() {
        // StubTimeSource advances 10ms per reading, including the one taken at
        // construction
        let collector = TelemetryCollector::new(8, 8, Arc::new(StubTimeSource::new()));
        collector.record(TelemetryEventKind::Warning, None);
        collector.record(TelemetryEventKind::Warning, None);

        let snapshot = collector.snapshot();
        assert_eq!(snapshot.recent[0].timestamp_ms, 10);
        assert_eq!(snapshot.recent[1].timestamp_ms, 20);
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let collector = TelemetryCollector::default();
        let mut rx = collector.subscribe();
        collector.record(
            TelemetryEventKind::SessionStopped {
                exercise_id: "box".to_string(),
            },
            None,
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event.kind,
            TelemetryEventKind::SessionStopped {
                exercise_id: "box".to_string()
            }
        );
    }

    #[test]
    fn event_kind_serializes_with_type_tag() {
        let json = serde_json::to_value(TelemetryEventKind::SampleRateAdjusted {
            from_hz: 44100,
            to_hz: 48000,
        })
        .unwrap();
        assert_eq!(json["type"], "sample_rate_adjusted");
        assert_eq!(json["to_hz"], 48000);
    }
}
