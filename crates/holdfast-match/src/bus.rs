//! Typed publish/subscribe.
//!
//! Producers publish without knowing who listens; listeners subscribe
//! without a reference to the producer. Publishing with no subscribers is
//! fine.

use std::fmt;

/// Returned by [`EventBus::subscribe`]; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<E> = Box<dyn FnMut(&E) + Send>;

pub struct EventBus<E> {
    handlers: Vec<(SubscriptionId, Handler<E>)>,
    next_id: u64,
}

impl<E> EventBus<E> {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn subscribe(&mut self, handler: impl FnMut(&E) + Send + 'static) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(sub, _)| *sub != id);
        self.handlers.len() != before
    }

    /// Calls every handler in subscription order.
    pub fn publish(&mut self, event: &E) {
        for (_, handler) in &mut self.handlers {
            handler(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for EventBus<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_publish_reaches_every_subscriber_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::<u32>::new();

        let a = Arc::clone(&seen);
        bus.subscribe(move |e| a.lock().unwrap().push(("a", *e)));
        let b = Arc::clone(&seen);
        bus.subscribe(move |e| b.lock().unwrap().push(("b", *e)));

        bus.publish(&7);
        assert_eq!(*seen.lock().unwrap(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::<()>::new();
        let c = Arc::clone(&count);
        let id = bus.subscribe(move |_| *c.lock().unwrap() += 1);

        bus.publish(&());
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&());

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_publish_without_subscribers_is_fine() {
        let mut bus = EventBus::<String>::new();
        bus.publish(&"nobody listens".to_string());
    }
}
