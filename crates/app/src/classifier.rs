//! Event classifier: one worker task per device.
//!
//! The worker is the single owner of its device's press state, so events
//! for a device are applied strictly in arrival order. Hold timers run as
//! separate tasks and report back through the worker's own queue; a report
//! carrying an outdated [`PressId`] is ignored.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use picolink_domain::action::ActionSpec;
use picolink_domain::button::{Button, ButtonEvent, Phase};
use picolink_domain::device::{ButtonBehavior, Device};
use picolink_domain::error::EventError;
use picolink_domain::id::PressId;
use picolink_domain::ramp::{Direction, EndReason};
use picolink_domain::resolver;
use picolink_domain::stop_policy::{GlobalDefaults, resolve_stop};

use crate::dispatch::Dispatcher;
use crate::ports::{ActionExecutor, StateReader};
use crate::ramp_scheduler::RampScheduler;

/// Messages accepted by a device worker.
#[derive(Debug)]
pub enum WorkerMessage {
    Event(ButtonEvent),
    HoldElapsed { button: Button, press_id: PressId },
    /// Answered once every earlier message has been handled.
    Flush(oneshot::Sender<()>),
}

#[derive(Debug)]
enum PressState {
    /// Waiting to learn whether this is a tap or a hold.
    Pending {
        press_id: PressId,
        direction: Direction,
        timer: CancellationToken,
    },
    /// A ramp session is running for the button.
    Ramping,
}

/// Everything a worker shares with the rest of the runtime.
pub struct WorkerContext<E, R> {
    pub dispatcher: Arc<Dispatcher<E, R>>,
    pub scheduler: Arc<RampScheduler<E, R>>,
    pub globals: Arc<GlobalDefaults>,
}

impl<E, R> Clone for WorkerContext<E, R> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: Arc::clone(&self.dispatcher),
            scheduler: Arc::clone(&self.scheduler),
            globals: Arc::clone(&self.globals),
        }
    }
}

/// Classifier state for one device.
pub struct DeviceWorker<E, R> {
    device: Arc<Device>,
    context: WorkerContext<E, R>,
    presses: HashMap<Button, PressState>,
    mailbox: mpsc::WeakSender<WorkerMessage>,
}

impl<E, R> DeviceWorker<E, R>
where
    E: ActionExecutor + Send + Sync + 'static,
    R: StateReader + Send + Sync + 'static,
{
    /// Build a worker. `mailbox` must feed the receiver later passed to
    /// [`run`](Self::run); hold timers report through it. It is held weakly
    /// so the worker never keeps its own inbox open.
    pub fn new(
        device: Arc<Device>,
        context: WorkerContext<E, R>,
        mailbox: mpsc::WeakSender<WorkerMessage>,
    ) -> Self {
        Self {
            device,
            context,
            presses: HashMap::new(),
            mailbox,
        }
    }

    /// Process messages until `shutdown` fires or every sender is gone.
    pub async fn run(mut self, mut inbox: mpsc::Receiver<WorkerMessage>, shutdown: CancellationToken) {
        loop {
            let message = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                message = inbox.recv() => message,
            };
            match message {
                Some(WorkerMessage::Event(event)) => self.handle_event(event).await,
                Some(WorkerMessage::HoldElapsed { button, press_id }) => {
                    self.handle_hold_elapsed(button, press_id).await;
                }
                Some(WorkerMessage::Flush(done)) => {
                    let _ = done.send(());
                }
                None => break,
            }
        }
        self.clear_presses();
        tracing::debug!(device_id = %self.device.id, "device worker stopped");
    }

    async fn handle_event(&mut self, event: ButtonEvent) {
        let Some(behavior) = self.device.behavior(event.button) else {
            let err = EventError::UnsupportedButton {
                hardware: self.device.hardware,
                button: event.button,
            };
            tracing::warn!(device_id = %self.device.id, error = %err, "button event dropped");
            return;
        };
        match event.phase {
            Phase::Press => self.on_press(event.button, behavior).await,
            Phase::Release => self.on_release(event.button).await,
        }
    }

    async fn on_press(&mut self, button: Button, behavior: ButtonBehavior) {
        if let Some(opposite) = button.opposite() {
            self.abandon(opposite, EndReason::Opposed).await;
        }
        match behavior {
            ButtonBehavior::Immediate => self.dispatch_tap(button).await,
            ButtonBehavior::HoldGated(direction) => {
                self.abandon(button, EndReason::Superseded).await;
                self.arm_hold_timer(button, direction);
            }
            ButtonBehavior::RampOnPress(direction) => {
                self.start_ramp(button, direction).await;
            }
            ButtonBehavior::Stop => self.dispatch_stop().await,
        }
    }

    async fn on_release(&mut self, button: Button) {
        match self.presses.remove(&button) {
            Some(PressState::Pending { timer, .. }) => {
                timer.cancel();
                self.dispatch_tap(button).await;
            }
            Some(PressState::Ramping) => {
                self.context
                    .scheduler
                    .cancel(&self.device.id, button, EndReason::Released)
                    .await;
            }
            None => {
                tracing::debug!(device_id = %self.device.id, button = %button, "release without open press ignored");
            }
        }
    }

    async fn handle_hold_elapsed(&mut self, button: Button, press_id: PressId) {
        let direction = match self.presses.get(&button) {
            Some(PressState::Pending {
                press_id: pending,
                direction,
                ..
            }) if *pending == press_id => *direction,
            _ => {
                tracing::trace!(device_id = %self.device.id, button = %button, "stale hold timer ignored");
                return;
            }
        };
        tracing::debug!(device_id = %self.device.id, button = %button, "hold detected");
        self.start_ramp(button, direction).await;
    }

    /// Drop whatever `button` is doing without running its tap action.
    async fn abandon(&mut self, button: Button, reason: EndReason) {
        match self.presses.remove(&button) {
            Some(PressState::Pending { timer, .. }) => timer.cancel(),
            Some(PressState::Ramping) => {
                self.context
                    .scheduler
                    .cancel(&self.device.id, button, reason)
                    .await;
            }
            None => {}
        }
    }

    fn arm_hold_timer(&mut self, button: Button, direction: Direction) {
        let press_id = PressId::new();
        let timer = CancellationToken::new();
        let hold_time = self.device.timing.hold_time;
        let mailbox = self.mailbox.clone();
        let cancelled = timer.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancelled.cancelled() => {}
                () = tokio::time::sleep(hold_time) => {
                    if let Some(mailbox) = mailbox.upgrade() {
                        let _ = mailbox.send(WorkerMessage::HoldElapsed { button, press_id }).await;
                    }
                }
            }
        });
        self.presses.insert(
            button,
            PressState::Pending {
                press_id,
                direction,
                timer,
            },
        );
    }

    async fn start_ramp(&mut self, button: Button, direction: Direction) {
        let started = self
            .context
            .scheduler
            .start(Arc::clone(&self.device), button, direction)
            .await;
        if started.is_some() {
            self.presses.insert(button, PressState::Ramping);
        } else {
            self.presses.remove(&button);
        }
    }

    async fn dispatch_tap(&self, button: Button) {
        let status = self.context.dispatcher.snapshot(&self.device).await;
        let actions = resolver::resolve(&self.device, button, status.as_ref());
        self.dispatch(button, &actions).await;
    }

    async fn dispatch_stop(&mut self) {
        self.clear_presses();
        let stopped = self
            .context
            .scheduler
            .cancel_device(&self.device.id, EndReason::Stopped)
            .await;
        let status = self.context.dispatcher.snapshot(&self.device).await;
        let resolution = resolve_stop(&self.device, &self.context.globals, status.as_ref());
        tracing::debug!(
            device_id = %self.device.id,
            source = %resolution.source,
            ramps_stopped = stopped,
            "stop resolved"
        );
        self.dispatch(Button::Stop, &resolution.actions).await;
    }

    async fn dispatch(&self, button: Button, actions: &ActionSpec) {
        if actions.is_empty() {
            tracing::debug!(device_id = %self.device.id, button = %button, "no action");
            return;
        }
        if let Err(err) = self.context.dispatcher.dispatch(&self.device, actions).await {
            tracing::warn!(
                device_id = %self.device.id,
                button = %button,
                error = %err,
                "action dispatch failed"
            );
        }
    }

    fn clear_presses(&mut self) {
        for (_, press) in self.presses.drain() {
            if let PressState::Pending { timer, .. } = press {
                timer.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeState, SpyExecutor};
    use picolink_domain::device::{Domain, HardwareType};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn should_stop_worker_when_queue_closes_with_hold_pending() {
        let device = Device::builder()
            .id("p")
            .hardware(HardwareType::Paddle)
            .entities(Domain::Lights, ["light.a"])
            .build()
            .unwrap();
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(SpyExecutor::default()),
            Arc::new(FakeState::default()),
        ));
        let context = WorkerContext {
            scheduler: Arc::new(RampScheduler::new(Arc::clone(&dispatcher))),
            dispatcher,
            globals: Arc::new(GlobalDefaults::default()),
        };
        let (sender, inbox) = mpsc::channel(8);
        let worker = DeviceWorker::new(Arc::new(device), context, sender.downgrade());
        let task = tokio::spawn(worker.run(inbox, CancellationToken::new()));

        sender
            .send(WorkerMessage::Event(ButtonEvent::press("p", Button::On)))
            .await
            .unwrap();
        drop(sender);

        tokio::time::timeout(Duration::from_millis(100), task)
            .await
            .expect("worker kept running after its queue closed")
            .unwrap();
    }
}
