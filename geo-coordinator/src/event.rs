//! Bounded per-subscriber event fan-out, mirroring the drop-on-full SSE
//! queue semantics used to push live dashboard updates.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Mutex;

use serde::Serialize;

const SUBSCRIBER_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "data")]
pub enum Event {
    RegionUpdate { region_key: String },
    WorkerUpdate { worker_name: String },
    Log { level: String, message: String },
    BootstrapProgress {
        current: usize,
        total: usize,
        created: usize,
        failed: usize,
        phase: String,
    },
}

pub struct Subscriber {
    rx: Receiver<Event>,
}

impl Subscriber {
    /// Non-blocking drain of everything currently queued.
    pub fn drain(&self) -> Vec<Event> {
        self.rx.try_iter().collect()
    }

    pub fn recv_timeout(&self, timeout: std::time::Duration) -> Option<Event> {
        self.rx.recv_timeout(timeout).ok()
    }
}

struct Slot {
    id: u64,
    tx: SyncSender<Event>,
}

/// Broadcasts events to subscribers through bounded channels. A subscriber
/// that falls behind has its queue fill up; the next push to it is dropped
/// rather than blocking the whole bus, and the subscriber is then removed.
#[derive(Default)]
pub struct EventBus {
    slots: Mutex<Vec<Slot>>,
    next_id: Mutex<u64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Vec::new()),
            next_id: Mutex::new(0),
        }
    }

    pub fn subscribe(&self) -> (u64, Subscriber) {
        let (tx, rx) = sync_channel(SUBSCRIBER_QUEUE_CAPACITY);
        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        self.slots.lock().unwrap().push(Slot { id, tx });
        (id, Subscriber { rx })
    }

    pub fn unsubscribe(&self, id: u64) {
        self.slots.lock().unwrap().retain(|slot| slot.id != id);
    }

    /// Pushes to every live subscriber. A full queue drops the event for
    /// that subscriber and removes it, matching a dead-reader disconnect.
    pub fn publish(&self, event: Event) {
        let mut slots = self.slots.lock().unwrap();
        slots.retain(|slot| match slot.tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            Err(TrySendError::Disconnected(_)) => false,
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_receives_published_events() {
        let bus = EventBus::new();
        let (_id, sub) = bus.subscribe();
        bus.publish(Event::RegionUpdate {
            region_key: "22_16".to_string(),
        });
        let drained = sub.drain();
        assert_eq!(drained.len(), 1);
    }

    #[test]
    fn full_queue_drops_subscriber_without_blocking() {
        let bus = EventBus::new();
        let (_id, _sub_kept_alive_but_not_drained) = bus.subscribe();
        for _ in 0..SUBSCRIBER_QUEUE_CAPACITY + 10 {
            bus.publish(Event::Log {
                level: "info".to_string(),
                message: "tick".to_string(),
            });
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribe_stops_future_delivery() {
        let bus = EventBus::new();
        let (id, sub) = bus.subscribe();
        bus.unsubscribe(id);
        bus.publish(Event::RegionUpdate {
            region_key: "0_0".to_string(),
        });
        assert!(sub.drain().is_empty());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
