//! In-memory fakes for the ports, shared by the unit tests of this crate.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Mutex;

use picolink_domain::action::ActionCall;
use picolink_domain::error::DispatchError;
use picolink_domain::status::EntityStatus;

use crate::ports::{ActionExecutor, StateReader};

// ── Spy executor ───────────────────────────────────────────────

#[derive(Default)]
pub struct SpyExecutor {
    calls: Mutex<Vec<ActionCall>>,
    attempts: Mutex<usize>,
    missing: HashSet<String>,
    transient_failures: Mutex<usize>,
}

impl SpyExecutor {
    pub fn with_missing(mut self, entity_id: &str) -> Self {
        self.missing.insert(entity_id.to_string());
        self
    }

    pub fn with_transient_failures(self, count: usize) -> Self {
        *self.transient_failures.lock().unwrap() = count;
        self
    }

    /// Calls that succeeded.
    pub fn calls(&self) -> Vec<ActionCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.action).collect()
    }

    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    fn record(&self, call: ActionCall) -> Result<(), DispatchError> {
        *self.attempts.lock().unwrap() += 1;
        if let Some(entity_id) = call.targets().iter().find(|id| self.missing.contains(*id)) {
            return Err(DispatchError::EntityNotFound {
                entity_id: entity_id.clone(),
            });
        }
        let mut failures = self.transient_failures.lock().unwrap();
        if *failures > 0 {
            *failures -= 1;
            return Err(DispatchError::Rejected {
                action: call.action,
                reason: "busy".to_string(),
            });
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

impl ActionExecutor for SpyExecutor {
    fn execute(&self, call: ActionCall) -> impl Future<Output = Result<(), DispatchError>> + Send {
        let result = self.record(call);
        async move { result }
    }
}

// ── Fake state ─────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeState {
    entities: Mutex<HashMap<String, EntityStatus>>,
}

impl FakeState {
    pub fn with_level(self, entity_id: &str, level: u8) -> Self {
        self.set_level(entity_id, level);
        self
    }

    pub fn with_status(self, entity_id: &str, status: EntityStatus) -> Self {
        self.entities
            .lock()
            .unwrap()
            .insert(entity_id.to_string(), status);
        self
    }

    pub fn set_level(&self, entity_id: &str, level: u8) {
        self.entities
            .lock()
            .unwrap()
            .entry(entity_id.to_string())
            .or_default()
            .level = Some(level);
    }
}

impl StateReader for FakeState {
    fn status(&self, entity_id: &str) -> impl Future<Output = Option<EntityStatus>> + Send {
        let status = self.entities.lock().unwrap().get(entity_id).copied();
        async move { status }
    }
}
