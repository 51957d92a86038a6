use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use super::EngineHandle;
use crate::session::{BreathingEvent, VocalEvent};
use crate::telemetry::TelemetryEvent;

/// Turn a broadcast receiver into a stream, skipping over lag gaps
fn lossy_stream<T: Clone + Send + 'static>(
    rx: broadcast::Receiver<T>,
    channel: &'static str,
) -> impl Stream<Item = T> {
    BroadcastStream::new(rx).filter_map(move |item| async move {
        match item {
            Ok(event) => Some(event),
            Err(err) => {
                log::warn!("[EngineHandle] {} subscriber lagged: {}", channel, err);
                None
            }
        }
    })
}

impl EngineHandle {
    // ========================================================================
    // STREAM SUBSCRIPTIONS
    // ========================================================================

    /// Subscribe to vocal session events.
    ///
    /// Subscribe before `start_vocal_exercise` to observe the whole run.
    pub fn subscribe_vocal(&self) -> broadcast::Receiver<VocalEvent> {
        self.broadcasts
            .subscribe_vocal()
            .unwrap_or_else(|| {
                self.broadcasts
                    .init_vocal(self.config().session.event_capacity)
                    .subscribe()
            })
    }

    pub fn subscribe_breathing(&self) -> broadcast::Receiver<BreathingEvent> {
        self.broadcasts
            .subscribe_breathing()
            .unwrap_or_else(|| {
                self.broadcasts
                    .init_breathing(self.config().session.event_capacity)
                    .subscribe()
            })
    }

    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<TelemetryEvent> {
        self.telemetry.subscribe()
    }

    /// Vocal events as a stream; ends when the engine is dropped.
    pub fn vocal_stream(&self) -> impl Stream<Item = VocalEvent> {
        lossy_stream(self.subscribe_vocal(), "vocal")
    }

    pub fn breathing_stream(&self) -> impl Stream<Item = BreathingEvent> {
        lossy_stream(self.subscribe_breathing(), "breathing")
    }

    pub fn telemetry_stream(&self) -> impl Stream<Item = TelemetryEvent> {
        lossy_stream(self.subscribe_telemetry(), "telemetry")
    }
}
