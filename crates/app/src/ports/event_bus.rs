//! Event bus port: publish button events to whoever interprets them.

use std::future::Future;

use picolink_domain::button::ButtonEvent;

/// Publishes button events to interested subscribers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: ButtonEvent) -> impl Future<Output = ()> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: ButtonEvent) -> impl Future<Output = ()> + Send {
        (**self).publish(event)
    }
}
