//! # picolink-adapter-virtual
//!
//! Virtual home that executes action calls against simulated entities and
//! reports their state back. It stands in for a real home-automation hub in
//! tests and in the demo daemon.
//!
//! ## Provided entities
//!
//! | Prefix | Services | Reported state |
//! |--------|----------|----------------|
//! | `light.` | `turn_on` (`brightness_pct`), `turn_off`, `toggle` | brightness, 0 when off |
//! | `fan.` | `turn_on`, `turn_off`, `set_percentage`, `set_direction` | percentage, direction |
//! | `cover.` | `open_cover`, `close_cover`, `stop_cover`, `set_cover_position` | position |
//! | `media_player.` | `turn_on`, `turn_off`, `volume_set`, `volume_mute` | volume, mute |
//! | `switch.` | `turn_on`, `turn_off`, `toggle` | nothing |
//! | anything else | every service of its own domain | nothing |
//!
//! Calls naming an entity the home does not know fail with
//! [`DispatchError::EntityNotFound`].
//!
//! ## Dependency rule
//!
//! Depends on `picolink-app` (port traits) and `picolink-domain` only.

mod entities;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use picolink_app::ports::{ActionExecutor, StateReader};
use picolink_domain::action::{ActionCall, ActionSpec};
use picolink_domain::device::{Device, Domain, MiddleButton};
use picolink_domain::error::DispatchError;
use picolink_domain::status::EntityStatus;

pub use entities::{
    VirtualCover, VirtualEntity, VirtualFan, VirtualLight, VirtualMediaPlayer, VirtualSwitch,
};

/// In-memory home with a call history.
#[derive(Debug, Default)]
pub struct VirtualHome {
    entities: Mutex<BTreeMap<String, VirtualEntity>>,
    history: Mutex<Vec<ActionCall>>,
}

impl VirtualHome {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity in its default state.
    #[must_use]
    pub fn with_entity(self, entity_id: &str) -> Self {
        self.insert(entity_id, VirtualEntity::for_entity_id(entity_id));
        self
    }

    /// A home holding every entity the devices refer to: their domain lists
    /// plus literal targets of scene mappings and explicit middle buttons.
    #[must_use]
    pub fn from_devices(devices: &[Device]) -> Self {
        let home = Self::new();
        for device in devices {
            for domain in Domain::ALL {
                for entity_id in device.entities.get(domain) {
                    home.ensure(entity_id);
                }
            }
            for spec in device.buttons.values() {
                home.register_targets(spec);
            }
            if let MiddleButton::Explicit(spec) = &device.middle_button {
                home.register_targets(spec);
            }
        }
        home
    }

    /// Add every literal target of `spec` that is not known yet.
    /// Placeholder tokens are skipped.
    pub fn register_targets(&self, spec: &ActionSpec) {
        for call in spec {
            for target in call.targets() {
                if Domain::from_placeholder(target).is_none() {
                    self.ensure(target);
                }
            }
        }
    }

    /// Add or replace an entity.
    pub fn insert(&self, entity_id: &str, entity: VirtualEntity) {
        self.lock_entities().insert(entity_id.to_string(), entity);
    }

    /// Forget an entity; later calls naming it fail as not found.
    pub fn remove(&self, entity_id: &str) -> Option<VirtualEntity> {
        self.lock_entities().remove(entity_id)
    }

    #[must_use]
    pub fn entity(&self, entity_id: &str) -> Option<VirtualEntity> {
        self.lock_entities().get(entity_id).cloned()
    }

    #[must_use]
    pub fn entity_ids(&self) -> Vec<String> {
        self.lock_entities().keys().cloned().collect()
    }

    /// Every call applied so far, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<ActionCall> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn ensure(&self, entity_id: &str) {
        self.lock_entities()
            .entry(entity_id.to_string())
            .or_insert_with(|| VirtualEntity::for_entity_id(entity_id));
    }

    fn apply(&self, call: &ActionCall) -> Result<(), DispatchError> {
        let Some((domain, service)) = call.domain_and_service() else {
            return Err(DispatchError::Rejected {
                action: call.action.clone(),
                reason: "action must be domain.service".to_string(),
            });
        };
        let mut entities = self.lock_entities();
        for entity_id in call.targets() {
            let Some(entity) = entities.get(entity_id) else {
                return Err(DispatchError::EntityNotFound {
                    entity_id: entity_id.clone(),
                });
            };
            if entity.domain() != domain {
                return Err(DispatchError::Rejected {
                    action: call.action.clone(),
                    reason: format!("{entity_id} is not a {domain} entity"),
                });
            }
        }
        for entity_id in call.targets() {
            if let Some(entity) = entities.get_mut(entity_id) {
                entity
                    .handle_service(service, &call.data)
                    .map_err(|reason| DispatchError::Rejected {
                        action: call.action.clone(),
                        reason,
                    })?;
            }
        }
        drop(entities);
        tracing::debug!(call = %call, "virtual call applied");
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call.clone());
        Ok(())
    }

    fn lock_entities(&self) -> MutexGuard<'_, BTreeMap<String, VirtualEntity>> {
        self.entities.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ActionExecutor for VirtualHome {
    fn execute(&self, call: ActionCall) -> impl Future<Output = Result<(), DispatchError>> + Send {
        let result = self.apply(&call);
        async move { result }
    }
}

impl StateReader for VirtualHome {
    fn status(&self, entity_id: &str) -> impl Future<Output = Option<EntityStatus>> + Send {
        let status = self.entity(entity_id).map(|entity| entity.status());
        async move { status }
    }
}
