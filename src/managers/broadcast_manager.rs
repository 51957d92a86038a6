// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::session::{BreathingEvent, VocalEvent};

/// Manages the session event channels
///
/// Channels outlive individual sessions: every run publishes on the same
/// sender, so a subscriber taken before `start_*` sees the whole run.
///
/// # Channel Types
/// - Vocal: note changes, live pitch, per-note scores, completion and errors
/// - Breathing: phase changes, ticks, round and drill completion
pub struct BroadcastChannelManager {
    vocal: Arc<Mutex<Option<broadcast::Sender<VocalEvent>>>>,
    breathing: Arc<Mutex<Option<broadcast::Sender<BreathingEvent>>>>,
}

fn lock<T>(slot: &Mutex<Option<broadcast::Sender<T>>>) -> MutexGuard<'_, Option<broadcast::Sender<T>>> {
    // A sender slot holds no invariant a panic could break
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn init<T: Clone>(slot: &Mutex<Option<broadcast::Sender<T>>>, capacity: usize) -> broadcast::Sender<T> {
    let mut guard = lock(slot);
    match guard.as_ref() {
        Some(tx) => tx.clone(),
        None => {
            let (tx, _) = broadcast::channel(capacity.max(1));
            *guard = Some(tx.clone());
            tx
        }
    }
}

impl BroadcastChannelManager {
    /// Create a new BroadcastChannelManager with all channels uninitialized
    ///
    /// Channels must be explicitly initialized via init_* methods before use.
    pub fn new() -> Self {
        Self {
            vocal: Arc::new(Mutex::new(None)),
            breathing: Arc::new(Mutex::new(None)),
        }
    }

    // ========================================================================
    // VOCAL CHANNEL
    // ========================================================================

    /// Initialize the vocal event channel, or return the existing sender
    ///
    /// `capacity` bounds how far a slow subscriber may fall behind before it
    /// starts missing events. Each run emits one pitch event per captured
    /// buffer while listening, so the default of 256 covers several notes.
    pub fn init_vocal(&self, capacity: usize) -> broadcast::Sender<VocalEvent> {
        init(&self.vocal, capacity)
    }

    /// Subscribe to vocal events; None until `init_vocal` has been called
    pub fn subscribe_vocal(&self) -> Option<broadcast::Receiver<VocalEvent>> {
        lock(&self.vocal).as_ref().map(|tx| tx.subscribe())
    }

    pub fn get_vocal_sender(&self) -> Option<broadcast::Sender<VocalEvent>> {
        lock(&self.vocal).clone()
    }

    // ========================================================================
    // BREATHING CHANNEL
    // ========================================================================

    /// Initialize the breathing event channel, or return the existing sender
    pub fn init_breathing(&self, capacity: usize) -> broadcast::Sender<BreathingEvent> {
        init(&self.breathing, capacity)
    }

    /// Subscribe to breathing events; None until `init_breathing` has been called
    pub fn subscribe_breathing(&self) -> Option<broadcast::Receiver<BreathingEvent>> {
        lock(&self.breathing).as_ref().map(|tx| tx.subscribe())
    }

    pub fn get_breathing_sender(&self) -> Option<broadcast::Sender<BreathingEvent>> {
        lock(&self.breathing).clone()
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exercise::Note;

    #[test]
    fn test_vocal_channel_lifecycle() {
        let manager = BroadcastChannelManager::new();

        // Initially no subscription possible
        assert!(manager.subscribe_vocal().is_none());
        assert!(manager.get_vocal_sender().is_none());

        let _tx = manager.init_vocal(16);

        assert!(manager.subscribe_vocal().is_some());
        assert!(manager.get_vocal_sender().is_some());
    }

    #[test]
    fn test_vocal_multiple_subscribers() {
        let manager = BroadcastChannelManager::new();
        let tx = manager.init_vocal(16);

        let mut rx1 = manager.subscribe_vocal().unwrap();
        let mut rx2 = manager.subscribe_vocal().unwrap();

        let event = VocalEvent::NoteChanged {
            index: 0,
            note: Note::new("A4", 440.0),
        };
        tx.send(event.clone()).unwrap();

        assert_eq!(rx1.try_recv().unwrap(), event);
        assert_eq!(rx2.try_recv().unwrap(), event);
    }

    #[test]
    fn test_init_reuses_existing_channel() {
        let manager = BroadcastChannelManager::new();
        let first = manager.init_breathing(8);
        let mut rx = manager.subscribe_breathing().unwrap();

        let second = manager.init_breathing(8);
        second.send(BreathingEvent::Completed).unwrap();

        assert_eq!(rx.try_recv().unwrap(), BreathingEvent::Completed);
        assert!(first.same_channel(&second));
    }

    #[test]
    fn test_default_implementation() {
        let manager = BroadcastChannelManager::default();

        // All channels should be uninitialized
        assert!(manager.subscribe_vocal().is_none());
        assert!(manager.subscribe_breathing().is_none());
    }
}
