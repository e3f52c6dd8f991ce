//! Room-based real-time fan-out over tokio broadcast channels.
//!
//! Events only reach subscribers in this process.

use futures::stream::{self, Stream};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeEvent {
    pub room: String,
    pub event: String,
    pub payload: serde_json::Value,
}

#[derive(Clone, Default)]
pub struct EventHub {
    rooms: Arc<Mutex<HashMap<String, broadcast::Sender<RealtimeEvent>>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, room: &str) -> broadcast::Sender<RealtimeEvent> {
        let mut rooms = self.rooms.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rooms
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: RealtimeEvent) -> usize {
        let sender = self.channel(&event.room);
        // No receivers is fine
        let delivered = sender.send(event.clone()).unwrap_or(0);
        debug!(room = %event.room, event = %event.event, delivered, "realtime event published");
        delivered
    }

    pub fn subscribe(&self, room: &str) -> broadcast::Receiver<RealtimeEvent> {
        self.channel(room).subscribe()
    }

    /// Subscription as a stream. Lagged receivers skip what they missed.
    pub fn stream(&self, room: &str) -> impl Stream<Item = RealtimeEvent> + Send + 'static {
        let receiver = self.subscribe(room);
        stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => return Some((event, receiver)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }
}
