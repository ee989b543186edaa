//! Publish/subscribe registry handed to whoever needs to hear about graph
//! loads and geometry persistence.

use futures::channel::mpsc;
use futures::{FutureExt, Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, Mutex, Weak};
use std::task::{Context, Poll};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GraphLoaded,
    GeometryPersisted,
    GeometryDegraded,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DesignerEvent {
    GraphLoaded { graph_id: String, nodes: usize, edges: usize },
    GeometryPersisted { graph_id: String },
    /// Geometry could not be read or written; positions are best effort.
    GeometryDegraded { graph_id: String, message: String },
}

impl DesignerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DesignerEvent::GraphLoaded { .. } => EventKind::GraphLoaded,
            DesignerEvent::GeometryPersisted { .. } => EventKind::GeometryPersisted,
            DesignerEvent::GeometryDegraded { .. } => EventKind::GeometryDegraded,
        }
    }
}

type Subscribers = HashMap<EventKind, Vec<(u64, mpsc::UnboundedSender<DesignerEvent>)>>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Subscribers,
}

#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, kind: EventKind) -> Subscription {
        let (sender, receiver) = mpsc::unbounded();
        let id = match self.registry.lock() {
            Ok(mut registry) => {
                let id = registry.next_id;
                registry.next_id += 1;
                registry.subscribers.entry(kind).or_default().push((id, sender));
                id
            }
            // Sender is dropped, so the subscription reads as closed.
            Err(_) => u64::MAX,
        };

        Subscription {
            id,
            kind,
            receiver,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver to every live subscriber of the event's kind. Returns how
    /// many received it.
    pub fn publish(&self, event: DesignerEvent) -> usize {
        let Ok(mut registry) = self.registry.lock() else {
            return 0;
        };
        let Some(subscribers) = registry.subscribers.get_mut(&event.kind()) else {
            return 0;
        };
        subscribers.retain(|(_, sender)| sender.unbounded_send(event.clone()).is_ok());
        subscribers.len()
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.registry
            .lock()
            .map(|registry| registry.subscribers.get(&kind).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

/// Receiving end of one subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    kind: EventKind,
    receiver: mpsc::UnboundedReceiver<DesignerEvent>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Next queued event, without waiting.
    pub fn try_next(&mut self) -> Option<DesignerEvent> {
        self.receiver.next().now_or_never().flatten()
    }

    pub fn cancel(self) {}
}

impl Stream for Subscription {
    type Item = DesignerEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().receiver.poll_next_unpin(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        if let Ok(mut registry) = registry.lock() {
            if let Some(subscribers) = registry.subscribers.get_mut(&self.kind) {
                subscribers.retain(|(id, _)| *id != self.id);
            }
        }
    }
}
