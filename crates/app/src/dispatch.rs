//! Outbound side shared by the classifier and the ramp scheduler.
//!
//! [`Dispatcher`] expands placeholders against the issuing device and hands
//! each call to the executor in order. It also takes the state snapshots
//! the resolvers need.

use picolink_domain::action::ActionSpec;
use picolink_domain::device::Device;
use picolink_domain::error::DispatchError;
use picolink_domain::placeholder;
use picolink_domain::status::EntityStatus;

use crate::ports::{ActionExecutor, StateReader};

/// Executor and state reader bundled for the runtime.
pub struct Dispatcher<E, R> {
    executor: E,
    reader: R,
}

impl<E, R> Dispatcher<E, R>
where
    E: ActionExecutor + Sync,
    R: StateReader + Sync,
{
    pub fn new(executor: E, reader: R) -> Self {
        Self { executor, reader }
    }

    /// State of the device's primary entity, if known.
    pub async fn snapshot(&self, device: &Device) -> Option<EntityStatus> {
        let entity_id = device.primary_entity()?;
        self.reader.status(entity_id).await
    }

    /// Expand `spec` for `device` and execute it front to back.
    ///
    /// Stops at the first failing call. Returns the number of calls
    /// executed.
    ///
    /// # Errors
    ///
    /// Returns the executor's [`DispatchError`] for the first failing call.
    pub async fn dispatch(&self, device: &Device, spec: &ActionSpec) -> Result<usize, DispatchError> {
        let expanded = placeholder::expand(spec, &device.entities);
        let mut executed = 0;
        for call in expanded {
            tracing::debug!(device_id = %device.id, call = %call, "executing call");
            self.executor.execute(call).await?;
            executed += 1;
        }
        Ok(executed)
    }
}
