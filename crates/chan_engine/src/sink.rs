use std::collections::BTreeSet;
use std::sync::{mpsc, Arc};

use chan_core::{EventKind, ObserverEvent};

/// Receives events in the order the observer produced them.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ObserverEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: ObserverEvent) {
        (**self).emit(event);
    }
}

pub struct ChannelEventSink {
    tx: mpsc::Sender<ObserverEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<ObserverEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: ObserverEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

struct Subscriber {
    kinds: Option<BTreeSet<EventKind>>,
    sink: Box<dyn EventSink>,
}

/// Fans events out to subscribers in registration order.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to every channel.
    pub fn subscribe(&mut self, sink: impl EventSink + 'static) -> &mut Self {
        self.subscribers.push(Subscriber {
            kinds: None,
            sink: Box::new(sink),
        });
        self
    }

    /// Subscribes to the given channels only.
    pub fn subscribe_to(
        &mut self,
        kinds: impl IntoIterator<Item = EventKind>,
        sink: impl EventSink + 'static,
    ) -> &mut Self {
        self.subscribers.push(Subscriber {
            kinds: Some(kinds.into_iter().collect()),
            sink: Box::new(sink),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: ObserverEvent) {
        let kind = event.kind();
        for subscriber in &self.subscribers {
            let wanted = subscriber
                .kinds
                .as_ref()
                .map_or(true, |kinds| kinds.contains(&kind));
            if wanted {
                subscriber.sink.emit(event.clone());
            }
        }
    }
}
