//! In-process button-event bus backed by a tokio broadcast channel.
//!
//! The daemon's input reader publishes here and the controller subscribes.
//! A subscriber that falls more than `capacity` events behind loses the
//! oldest ones and is told how many it missed.

use std::future::Future;

use tokio::sync::broadcast;

use picolink_domain::button::ButtonEvent;

use crate::ports::EventPublisher;

/// Fan-out of [`ButtonEvent`]s. Publishing with nobody listening drops the
/// event.
#[derive(Debug, Clone)]
pub struct InProcessEventBus {
    sender: broadcast::Sender<ButtonEvent>,
}

impl InProcessEventBus {
    /// `capacity` bounds how far a subscriber may lag.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receiver for every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ButtonEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for InProcessEventBus {
    fn publish(&self, event: ButtonEvent) -> impl Future<Output = ()> + Send {
        if self.sender.send(event).is_err() {
            tracing::trace!("button event published with no subscriber");
        }
        async {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use picolink_domain::button::{Button, Phase};

    #[tokio::test]
    async fn should_deliver_event_to_subscriber() {
        let bus = InProcessEventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(ButtonEvent::press("remote", Button::Raise)).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.button, Button::Raise);
        assert_eq!(received.phase, Phase::Press);
    }

    #[tokio::test]
    async fn should_deliver_event_to_multiple_subscribers() {
        let bus = InProcessEventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let event = ButtonEvent::release("remote", Button::Off);
        bus.publish(event.clone()).await;

        assert_eq!(rx1.recv().await.unwrap(), event);
        assert_eq!(rx2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn should_not_fail_when_no_subscribers() {
        let bus = InProcessEventBus::new(16);
        bus.publish(ButtonEvent::press("remote", Button::On)).await;
    }

    #[tokio::test]
    async fn should_not_deliver_events_published_before_subscription() {
        let bus = InProcessEventBus::new(16);
        bus.publish(ButtonEvent::press("remote", Button::On)).await;

        let mut rx = bus.subscribe();
        bus.publish(ButtonEvent::press("remote", Button::Stop)).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.button, Button::Stop);
    }

    #[tokio::test]
    async fn should_report_lag_when_subscriber_falls_behind() {
        let bus = InProcessEventBus::new(2);
        let mut rx = bus.subscribe();

        for button in [Button::On, Button::Off, Button::Raise] {
            bus.publish(ButtonEvent::press("remote", button)).await;
        }

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap().button, Button::Off);
    }
}
