//! Controller: routes button events to per-device workers.
//!
//! [`PicoController::start`] spawns one [`DeviceWorker`] per configured
//! device. Events are forwarded over the worker's queue so each device sees
//! its events in arrival order while different devices proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use picolink_domain::button::ButtonEvent;
use picolink_domain::device::Device;
use picolink_domain::id::DeviceId;
use picolink_domain::stop_policy::GlobalDefaults;

use crate::classifier::{DeviceWorker, WorkerContext, WorkerMessage};
use crate::dispatch::Dispatcher;
use crate::ports::{ActionExecutor, StateReader};
use crate::ramp_scheduler::RampScheduler;

const WORKER_QUEUE: usize = 64;

/// Running button-interpretation core.
pub struct PicoController<E, R> {
    workers: HashMap<DeviceId, mpsc::Sender<WorkerMessage>>,
    scheduler: Arc<RampScheduler<E, R>>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<E, R> PicoController<E, R>
where
    E: ActionExecutor + Send + Sync + 'static,
    R: StateReader + Send + Sync + 'static,
{
    /// Spawn a worker for every device. Must be called inside a tokio runtime.
    ///
    /// A device id listed twice keeps its last definition.
    pub fn start(devices: Vec<Device>, globals: GlobalDefaults, executor: E, reader: R) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(executor, reader));
        let scheduler = Arc::new(RampScheduler::new(Arc::clone(&dispatcher)));
        let context = WorkerContext {
            dispatcher,
            scheduler: Arc::clone(&scheduler),
            globals: Arc::new(globals),
        };
        let shutdown = CancellationToken::new();

        let mut workers = HashMap::new();
        let mut tasks = Vec::new();
        for device in devices {
            let device = Arc::new(device);
            let (sender, inbox) = mpsc::channel(WORKER_QUEUE);
            let worker = DeviceWorker::new(Arc::clone(&device), context.clone(), sender.downgrade());
            tasks.push(tokio::spawn(worker.run(inbox, shutdown.child_token())));
            if workers.insert(device.id.clone(), sender).is_some() {
                tracing::warn!(device_id = %device.id, "duplicate device replaced");
            }
        }
        tracing::info!(devices = workers.len(), "controller started");

        Self {
            workers,
            scheduler,
            shutdown,
            tasks,
        }
    }

    #[must_use]
    pub fn scheduler(&self) -> &RampScheduler<E, R> {
        &self.scheduler
    }

    /// Hand `event` to its device's worker.
    ///
    /// Returns `false` when the device is unknown or its worker is gone.
    pub async fn handle_event(&self, event: ButtonEvent) -> bool {
        let Some(worker) = self.workers.get(&event.device_id) else {
            tracing::debug!(device_id = %event.device_id, "event for unknown device dropped");
            return false;
        };
        let device_id = event.device_id.clone();
        if worker.send(WorkerMessage::Event(event)).await.is_err() {
            tracing::warn!(device_id = %device_id, "device worker unavailable");
            return false;
        }
        true
    }

    /// Consume a bus subscription until the bus closes or the controller
    /// shuts down.
    pub async fn run(&self, mut events: broadcast::Receiver<ButtonEvent>) {
        loop {
            let received = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                received = events.recv() => received,
            };
            match received {
                Ok(event) => {
                    self.handle_event(event).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "button events lost, consumer lagging");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Wait until every worker has handled everything queued so far.
    pub async fn flush(&self) {
        for worker in self.workers.values() {
            let (done, handled) = oneshot::channel();
            if worker.send(WorkerMessage::Flush(done)).await.is_ok() {
                let _ = handled.await;
            }
        }
    }

    /// Stop the workers, cancel pending hold timers and every ramp session.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for task in self.tasks {
            if let Err(err) = task.await {
                tracing::warn!(error = %err, "device worker failed");
            }
        }
        let ramps = self.scheduler.cancel_all().await;
        tracing::info!(ramps_stopped = ramps, "controller stopped");
    }
}
