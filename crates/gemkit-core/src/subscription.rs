//! Subscription registry.
//!
//! Maps each [`EventType`] to the ordered list of consumers that want its
//! payloads. Subscriptions are made while the handler is being configured;
//! the registry is read-only once dispatch starts.

use crate::events::{EventType, Payload};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Receiver of dispatched payloads
///
/// Implement this trait to receive events. Callbacks run on the dispatch
/// thread, so they should return quickly.
pub trait CallbackConsumer: Send + Sync {
    /// Called once per dispatched payload of a subscribed event type
    fn callback(&self, event_type: EventType, payload: &Payload);
}

impl<F> CallbackConsumer for F
where
    F: Fn(EventType, &Payload) + Send + Sync,
{
    fn callback(&self, event_type: EventType, payload: &Payload) {
        self(event_type, payload)
    }
}

/// Shared handle to a subscriber
pub type Subscriber = Arc<dyn CallbackConsumer>;

/// Ordered subscriber lists keyed by event type
#[derive(Default, Clone)]
pub struct SubscriptionRegistry {
    subscribers: BTreeMap<EventType, Vec<Subscriber>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a subscriber for an event type
    ///
    /// Subscribing the same consumer twice yields two deliveries per event.
    pub fn subscribe(&mut self, event_type: EventType, subscriber: Subscriber) {
        let list = self.subscribers.entry(event_type).or_default();
        list.push(subscriber);
        tracing::debug!(
            "Subscriber #{} added for {}",
            list.len(),
            event_type
        );
    }

    /// Subscribers for an event type, in subscription order
    pub fn subscribers_for(&self, event_type: EventType) -> &[Subscriber] {
        self.subscribers
            .get(&event_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Deliver a payload to every subscriber of `event_type`, in order
    ///
    /// Returns the number of subscribers invoked.
    pub fn notify(&self, event_type: EventType, payload: &Payload) -> usize {
        let subscribers = self.subscribers_for(event_type);
        for subscriber in subscribers {
            subscriber.callback(event_type, payload);
        }
        subscribers.len()
    }

    /// Number of subscribers for an event type
    pub fn subscriber_count(&self, event_type: EventType) -> usize {
        self.subscribers_for(event_type).len()
    }

    /// Whether nothing is subscribed at all
    pub fn is_empty(&self) -> bool {
        self.subscribers.values().all(Vec::is_empty)
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: BTreeMap<EventType, usize> = self
            .subscribers
            .iter()
            .map(|(et, list)| (*et, list.len()))
            .collect();
        f.debug_struct("SubscriptionRegistry")
            .field("subscribers", &counts)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Subscriber {
        let log = log.clone();
        Arc::new(move |et: EventType, _: &Payload| {
            log.lock().push(format!("{name}:{et}"));
        })
    }

    #[test]
    fn test_empty_registry() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.subscribers_for(EventType::DoorSensor).is_empty());
        assert_eq!(
            registry.notify(EventType::DoorSensor, &Payload::Input("x".into())),
            0
        );
    }

    #[test]
    fn test_notify_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(EventType::ButtonPress, recorder(&log, "first"));
        registry.subscribe(EventType::ButtonPress, recorder(&log, "second"));
        registry.subscribe(EventType::DoorSensor, recorder(&log, "door"));

        let invoked = registry.notify(
            EventType::ButtonPress,
            &Payload::Interrupt { pin: 30, level: 1 },
        );

        assert_eq!(invoked, 2);
        assert_eq!(
            *log.lock(),
            vec!["first:ButtonPress".to_string(), "second:ButtonPress".to_string()]
        );
    }

    #[test]
    fn test_duplicate_subscription_delivers_twice() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sub = recorder(&log, "dup");
        let mut registry = SubscriptionRegistry::new();
        registry.subscribe(EventType::StdinInput, sub.clone());
        registry.subscribe(EventType::StdinInput, sub);

        registry.notify(EventType::StdinInput, &Payload::Input("q".into()));
        assert_eq!(log.lock().len(), 2);
        assert_eq!(registry.subscriber_count(EventType::StdinInput), 2);
    }
}
