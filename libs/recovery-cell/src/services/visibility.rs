use tokio::sync::broadcast;

use crate::models::VisibilityEvent;

const CHANNEL_CAPACITY: usize = 32;

/// Fan-out of host-shell visibility/focus/network signals. The shell calls
/// `emit`; the session coordinator, watchdog, and data views each hold their
/// own receiver.
#[derive(Clone)]
pub struct VisibilityEvents {
    tx: broadcast::Sender<VisibilityEvent>,
}

impl Default for VisibilityEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilityEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, event: VisibilityEvent) {
        // No receivers is fine; components subscribe lazily.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VisibilityEvent> {
        self.tx.subscribe()
    }
}
