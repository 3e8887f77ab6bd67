use tokio::sync::broadcast;

use crate::model::EngineEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast hub the presentation layer subscribes to for engine events.
pub struct NotifyHub {
    sender: broadcast::Sender<EngineEvent>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, event: EngineEvent) {
        let _ = self.sender.send(event);
    }
}
