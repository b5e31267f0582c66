//! Ramp scheduler: at most one ticking session per `(device, button)`.
//!
//! Each session runs as its own task and is stopped through a
//! [`CancellationToken`]. Every key has its own slot behind an async lock.
//! A start holds that lock while the old task winds down, so two sessions
//! for one key never overlap, and other keys are never blocked by it.
//! Bulk cancels cancel under each slot's lock and join after releasing it.
//! Sessions never touch the table themselves; a slot whose task ended on
//! its own is noticed lazily through [`JoinHandle::is_finished`].

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use picolink_domain::button::Button;
use picolink_domain::device::Device;
use picolink_domain::id::{DeviceId, SessionId};
use picolink_domain::ramp::{Direction, EndReason, RampSession, StepRule, TickDecision};
use picolink_domain::resolver;
use picolink_domain::time::{elapsed_ms, now};

use crate::dispatch::Dispatcher;
use crate::ports::{ActionExecutor, StateReader};

type RampKey = (DeviceId, Button);
type SlotCell = Arc<Mutex<Option<RampSlot>>>;

struct RampSlot {
    session_id: SessionId,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl RampSlot {
    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// Owns every live [`RampSession`].
pub struct RampScheduler<E, R> {
    dispatcher: Arc<Dispatcher<E, R>>,
    cells: std::sync::Mutex<HashMap<RampKey, SlotCell>>,
}

impl<E, R> RampScheduler<E, R>
where
    E: ActionExecutor + Send + Sync + 'static,
    R: StateReader + Send + Sync + 'static,
{
    pub fn new(dispatcher: Arc<Dispatcher<E, R>>) -> Self {
        Self {
            dispatcher,
            cells: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Start ramping `device` for `button`, replacing any session already
    /// running for that pair. The first step fires right away.
    ///
    /// Returns `None` when the device's domain has no level to ramp.
    pub async fn start(
        &self,
        device: Arc<Device>,
        button: Button,
        direction: Direction,
    ) -> Option<SessionId> {
        let Some(rule) = StepRule::for_device(&device) else {
            tracing::warn!(device_id = %device.id, button = %button, "domain cannot be ramped");
            return None;
        };
        let cell = self.cell(&(device.id.clone(), button));
        let mut slot = cell.lock().await;
        if let Some(previous) = slot.take() {
            stop_slot(previous, EndReason::Superseded).await;
        }

        let session = RampSession::new(device.id.clone(), button, direction, now());
        let session_id = session.id;
        let token = CancellationToken::new();
        tracing::debug!(
            device_id = %device.id,
            button = %button,
            direction = %direction,
            session_id = %session_id,
            "ramp session started"
        );
        let handle = tokio::spawn(run_session(
            session,
            device,
            rule,
            Arc::clone(&self.dispatcher),
            token.clone(),
        ));
        *slot = Some(RampSlot {
            session_id,
            token,
            handle,
        });
        Some(session_id)
    }

    /// Stop the session for `(device_id, button)` and wait until it is gone.
    ///
    /// Returns `true` when a running session was stopped.
    pub async fn cancel(&self, device_id: &DeviceId, button: Button, reason: EndReason) -> bool {
        let key = (device_id.clone(), button);
        let Some(cell) = self.cells_where(|candidate| *candidate == key).pop() else {
            return false;
        };
        let mut slot = cell.lock().await;
        match slot.take() {
            Some(previous) => stop_slot(previous, reason).await,
            None => false,
        }
    }

    /// Stop every session of `device_id`. Returns how many were running.
    pub async fn cancel_device(&self, device_id: &DeviceId, reason: EndReason) -> usize {
        let cells = self.cells_where(|(id, _)| id == device_id);
        join_all(take_cancelled(cells).await, reason).await
    }

    /// Stop everything. Used on shutdown.
    pub async fn cancel_all(&self) -> usize {
        let cells = self.cells_where(|_| true);
        join_all(take_cancelled(cells).await, EndReason::Shutdown).await
    }

    /// Whether a session for the pair is currently ticking.
    pub async fn is_active(&self, device_id: &DeviceId, button: Button) -> bool {
        let key = (device_id.clone(), button);
        let Some(cell) = self.cells_where(|candidate| *candidate == key).pop() else {
            return false;
        };
        let slot = cell.lock().await;
        slot.as_ref().is_some_and(RampSlot::is_running)
    }

    /// Number of sessions currently ticking.
    pub async fn active_sessions(&self) -> usize {
        let mut count = 0;
        for cell in self.cells_where(|_| true) {
            if cell.lock().await.as_ref().is_some_and(RampSlot::is_running) {
                count += 1;
            }
        }
        count
    }

    fn cell(&self, key: &RampKey) -> SlotCell {
        let mut cells = self.cells.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cells.entry(key.clone()).or_default())
    }

    fn cells_where(&self, matches: impl Fn(&RampKey) -> bool) -> Vec<SlotCell> {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(key, _)| matches(key))
            .map(|(_, cell)| Arc::clone(cell))
            .collect()
    }
}

/// Empty each cell, cancelling its session before the lock is released.
/// Each slot comes back paired with whether it was still running.
async fn take_cancelled(cells: Vec<SlotCell>) -> Vec<(RampSlot, bool)> {
    let mut taken = Vec::new();
    for cell in cells {
        if let Some(slot) = cell.lock().await.take() {
            let was_running = slot.is_running();
            slot.token.cancel();
            taken.push((slot, was_running));
        }
    }
    taken
}

async fn join_all(taken: Vec<(RampSlot, bool)>, reason: EndReason) -> usize {
    let mut stopped = 0;
    for (slot, was_running) in taken {
        join_slot(slot, was_running, reason).await;
        if was_running {
            stopped += 1;
        }
    }
    stopped
}

async fn stop_slot(slot: RampSlot, reason: EndReason) -> bool {
    let was_running = slot.is_running();
    slot.token.cancel();
    join_slot(slot, was_running, reason).await;
    was_running
}

async fn join_slot(slot: RampSlot, was_running: bool, reason: EndReason) {
    if let Err(err) = slot.handle.await {
        tracing::warn!(session_id = %slot.session_id, error = %err, "ramp session task failed");
    }
    if was_running {
        tracing::debug!(session_id = %slot.session_id, reason = %reason, "ramp session cancelled");
    }
}

async fn run_session<E, R>(
    mut session: RampSession,
    device: Arc<Device>,
    rule: StepRule,
    dispatcher: Arc<Dispatcher<E, R>>,
    token: CancellationToken,
) where
    E: ActionExecutor + Sync,
    R: StateReader + Sync,
{
    let ended = tokio::select! {
        biased;
        () = token.cancelled() => None,
        reason = tick_loop(&mut session, &device, &rule, &dispatcher) => Some(reason),
    };
    session.finish();
    let lasted_ms = elapsed_ms(session.started_at, now());
    match ended {
        Some(EndReason::TickLimit) => tracing::warn!(
            device_id = %session.device_id,
            session_id = %session.id,
            ticks = session.ticks,
            lasted_ms,
            "ramp session hit its tick limit"
        ),
        Some(reason) => tracing::debug!(
            device_id = %session.device_id,
            session_id = %session.id,
            reason = %reason,
            lasted_ms,
            "ramp session ended"
        ),
        None => {}
    }
}

async fn tick_loop<E, R>(
    session: &mut RampSession,
    device: &Device,
    rule: &StepRule,
    dispatcher: &Dispatcher<E, R>,
) -> EndReason
where
    E: ActionExecutor + Sync,
    R: StateReader + Sync,
{
    let timing = device.timing;
    let mut interval = tokio::time::interval(timing.step_time);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let observed = dispatcher.snapshot(device).await.and_then(|status| status.level);
        let value = match session.next_tick(rule, timing.boundary, timing.max_ramp_ticks, observed) {
            TickDecision::Emit(value) => value,
            TickDecision::Suppress => {
                tracing::trace!(session_id = %session.id, "ramp parked at bound");
                continue;
            }
            TickDecision::Finish(reason) => return reason,
        };
        let Some(step) = resolver::step_action(device, value) else {
            return EndReason::Boundary;
        };
        match dispatcher.dispatch(device, &step).await {
            Ok(_) => {
                session.commit(value, now());
                tracing::debug!(session_id = %session.id, value, "ramp step");
            }
            Err(err) if err.is_permanent() => {
                tracing::warn!(session_id = %session.id, error = %err, "ramp target gone");
                return EndReason::EntityGone;
            }
            Err(err) => {
                tracing::warn!(session_id = %session.id, error = %err, "ramp step failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeState, SpyExecutor};
    use picolink_domain::device::{Domain, HardwareType, Timing};
    use picolink_domain::ramp::BoundaryPolicy;
    use std::time::Duration;

    const STEP: Duration = Duration::from_millis(750);

    type TestScheduler = RampScheduler<Arc<SpyExecutor>, Arc<FakeState>>;

    fn light_device(timing: Timing) -> Arc<Device> {
        Arc::new(
            Device::builder()
                .id("remote")
                .hardware(HardwareType::FiveButton)
                .entities(Domain::Lights, ["light.a"])
                .timing(timing)
                .build()
                .unwrap(),
        )
    }

    fn scheduler(executor: &Arc<SpyExecutor>, state: &Arc<FakeState>) -> TestScheduler {
        RampScheduler::new(Arc::new(Dispatcher::new(
            Arc::clone(executor),
            Arc::clone(state),
        )))
    }

    fn brightness(executor: &SpyExecutor) -> Vec<u64> {
        executor
            .calls()
            .iter()
            .map(|call| call.data["brightness_pct"].as_u64().unwrap())
            .collect()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn should_fire_first_step_immediately() {
        let executor = Arc::new(SpyExecutor::default());
        let state = Arc::new(FakeState::default().with_level("light.a", 50));
        let scheduler = scheduler(&executor, &state);

        scheduler
            .start(light_device(Timing::default()), Button::Raise, Direction::Up)
            .await
            .unwrap();
        settle().await;

        assert_eq!(brightness(&executor), [60]);
        assert_eq!(executor.calls()[0].targets(), ["light.a"]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_tick_once_per_step_interval() {
        let executor = Arc::new(SpyExecutor::default());
        let state = Arc::new(FakeState::default().with_level("light.a", 20));
        let scheduler = scheduler(&executor, &state);

        scheduler
            .start(light_device(Timing::default()), Button::Lower, Direction::Down)
            .await;
        settle().await;
        tokio::time::sleep(STEP * 2).await;

        assert_eq!(brightness(&executor), [10, 5]);
        assert!(scheduler.is_active(&DeviceId::new("remote"), Button::Lower).await);
    }

    #[tokio::test(start_paused = true)]
    async fn should_replace_session_for_same_key() {
        let executor = Arc::new(SpyExecutor::default());
        let state = Arc::new(FakeState::default().with_level("light.a", 50));
        let scheduler = scheduler(&executor, &state);
        let device = light_device(Timing::default());

        let first = scheduler
            .start(Arc::clone(&device), Button::Raise, Direction::Up)
            .await
            .unwrap();
        let second = scheduler
            .start(Arc::clone(&device), Button::Raise, Direction::Up)
            .await
            .unwrap();
        settle().await;

        assert_ne!(first, second);
        assert_eq!(scheduler.active_sessions().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_one_session_under_concurrent_starts() {
        let executor = Arc::new(SpyExecutor::default());
        let state = Arc::new(FakeState::default().with_level("light.a", 50));
        let scheduler = scheduler(&executor, &state);
        let device = light_device(Timing::default());

        tokio::join!(
            scheduler.start(Arc::clone(&device), Button::Raise, Direction::Up),
            scheduler.start(Arc::clone(&device), Button::Raise, Direction::Up),
            scheduler.start(Arc::clone(&device), Button::Lower, Direction::Down),
        );
        settle().await;

        assert_eq!(scheduler.active_sessions().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn should_park_at_bound_without_duplicate_dispatch() {
        let executor = Arc::new(SpyExecutor::default());
        let state = Arc::new(FakeState::default().with_level("light.a", 95));
        let scheduler = scheduler(&executor, &state);

        scheduler
            .start(light_device(Timing::default()), Button::Raise, Direction::Up)
            .await;
        settle().await;
        tokio::time::sleep(STEP * 4).await;

        assert_eq!(brightness(&executor), [100]);
        assert!(scheduler.is_active(&DeviceId::new("remote"), Button::Raise).await);
    }

    #[tokio::test(start_paused = true)]
    async fn should_resume_parked_session_after_external_change() {
        let executor = Arc::new(SpyExecutor::default());
        let state = Arc::new(FakeState::default().with_level("light.a", 100));
        let scheduler = scheduler(&executor, &state);

        scheduler
            .start(light_device(Timing::default()), Button::Raise, Direction::Up)
            .await;
        settle().await;
        tokio::time::sleep(STEP).await;
        assert!(executor.calls().is_empty());

        state.set_level("light.a", 30);
        tokio::time::sleep(STEP).await;

        assert_eq!(brightness(&executor), [40]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_end_session_at_bound_with_stop_policy() {
        let executor = Arc::new(SpyExecutor::default());
        let state = Arc::new(FakeState::default().with_level("light.a", 100));
        let scheduler = scheduler(&executor, &state);
        let timing = Timing {
            boundary: BoundaryPolicy::Stop,
            ..Timing::default()
        };

        scheduler
            .start(light_device(timing), Button::Raise, Direction::Up)
            .await;
        settle().await;

        assert!(!scheduler.is_active(&DeviceId::new("remote"), Button::Raise).await);
        assert!(executor.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn should_end_session_when_entity_is_gone() {
        let executor = Arc::new(SpyExecutor::default().with_missing("light.a"));
        let state = Arc::new(FakeState::default().with_level("light.a", 50));
        let scheduler = scheduler(&executor, &state);

        scheduler
            .start(light_device(Timing::default()), Button::Raise, Direction::Up)
            .await;
        settle().await;
        tokio::time::sleep(STEP * 3).await;

        assert_eq!(executor.attempts(), 1);
        assert!(!scheduler.is_active(&DeviceId::new("remote"), Button::Raise).await);
    }

    #[tokio::test(start_paused = true)]
    async fn should_keep_ticking_after_transient_failure() {
        let executor = Arc::new(SpyExecutor::default().with_transient_failures(1));
        let state = Arc::new(FakeState::default().with_level("light.a", 50));
        let scheduler = scheduler(&executor, &state);

        scheduler
            .start(light_device(Timing::default()), Button::Raise, Direction::Up)
            .await;
        settle().await;
        tokio::time::sleep(STEP).await;

        assert_eq!(executor.attempts(), 2);
        assert_eq!(brightness(&executor), [60]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_after_tick_limit() {
        let executor = Arc::new(SpyExecutor::default());
        let state = Arc::new(FakeState::default().with_level("light.a", 10));
        let scheduler = scheduler(&executor, &state);
        let timing = Timing {
            max_ramp_ticks: 2,
            ..Timing::default()
        };

        scheduler
            .start(light_device(timing), Button::Raise, Direction::Up)
            .await;
        settle().await;
        tokio::time::sleep(STEP * 4).await;

        assert_eq!(brightness(&executor), [20, 30]);
        assert_eq!(scheduler.active_sessions().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_ticking_once_cancelled() {
        let executor = Arc::new(SpyExecutor::default());
        let state = Arc::new(FakeState::default().with_level("light.a", 50));
        let scheduler = scheduler(&executor, &state);
        let device_id = DeviceId::new("remote");

        scheduler
            .start(light_device(Timing::default()), Button::Raise, Direction::Up)
            .await;
        settle().await;
        assert!(scheduler.cancel(&device_id, Button::Raise, EndReason::Released).await);
        tokio::time::sleep(STEP * 3).await;

        assert_eq!(executor.calls().len(), 1);
        assert!(!scheduler.cancel(&device_id, Button::Raise, EndReason::Released).await);
    }

    #[tokio::test(start_paused = true)]
    async fn should_cancel_every_session_of_a_device() {
        let executor = Arc::new(SpyExecutor::default());
        let state = Arc::new(FakeState::default().with_level("light.a", 50));
        let scheduler = scheduler(&executor, &state);
        let device = light_device(Timing::default());

        scheduler.start(Arc::clone(&device), Button::Raise, Direction::Up).await;
        scheduler.start(Arc::clone(&device), Button::Lower, Direction::Down).await;

        let stopped = scheduler.cancel_device(&device.id, EndReason::Stopped).await;

        assert_eq!(stopped, 2);
        assert_eq!(scheduler.active_sessions().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_refuse_to_ramp_switches() {
        let executor = Arc::new(SpyExecutor::default());
        let state = Arc::new(FakeState::default());
        let scheduler = scheduler(&executor, &state);
        let device = Arc::new(
            Device::builder()
                .id("remote")
                .entities(Domain::Switches, ["switch.a"])
                .build()
                .unwrap(),
        );

        assert!(scheduler.start(device, Button::Raise, Direction::Up).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn should_not_ramp_when_level_is_unknown() {
        let executor = Arc::new(SpyExecutor::default());
        let state = Arc::new(FakeState::default());
        let scheduler = scheduler(&executor, &state);

        scheduler
            .start(light_device(Timing::default()), Button::Raise, Direction::Up)
            .await
            .unwrap();
        settle().await;
        tokio::time::sleep(STEP * 3).await;

        assert_eq!(executor.attempts(), 0);
        assert_eq!(scheduler.active_sessions().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn should_stay_parked_while_held_beyond_tick_limit() {
        let executor = Arc::new(SpyExecutor::default());
        let state = Arc::new(FakeState::default().with_level("light.a", 100));
        let scheduler = scheduler(&executor, &state);
        let device_id = DeviceId::new("remote");

        scheduler
            .start(light_device(Timing::default()), Button::Raise, Direction::Up)
            .await;
        settle().await;
        tokio::time::sleep(Duration::from_secs(80)).await;
        assert!(scheduler.is_active(&device_id, Button::Raise).await);

        state.set_level("light.a", 30);
        tokio::time::sleep(STEP).await;

        assert_eq!(brightness(&executor), [40]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_start_other_device_while_one_key_is_busy() {
        let executor = Arc::new(SpyExecutor::default());
        let state = Arc::new(FakeState::default().with_level("light.b", 50));
        let scheduler = scheduler(&executor, &state);
        let other = Arc::new(
            Device::builder()
                .id("other")
                .hardware(HardwareType::FiveButton)
                .entities(Domain::Lights, ["light.b"])
                .build()
                .unwrap(),
        );

        let busy = scheduler.cell(&(DeviceId::new("remote"), Button::Raise));
        let _held = busy.lock().await;
        let started = tokio::time::timeout(
            Duration::from_millis(100),
            scheduler.start(Arc::clone(&other), Button::Raise, Direction::Up),
        )
        .await
        .expect("start waited on an unrelated key");
        settle().await;

        assert!(started.is_some());
        assert!(scheduler.is_active(&other.id, Button::Raise).await);
        assert_eq!(brightness(&executor), [60]);
    }
}
