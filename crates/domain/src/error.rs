//! Common error types used across the workspace.
//!
//! Each concern has its own typed error.

use crate::button::Button;
use crate::device::{Domain, HardwareType};

/// Invariant violations detected while building a [`Device`](crate::device::Device).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("device identifier must not be empty")]
    EmptyDeviceId,

    #[error("a {0} device needs exactly one controlled domain")]
    MissingDomain(HardwareType),

    #[error("only one domain may be assigned, found {first} and {second}")]
    MultipleDomains { first: Domain, second: Domain },

    #[error("scene devices must not control a domain")]
    DomainOnSceneDevice,

    #[error("scene devices need at least one mapped button")]
    NoSceneButtons,

    #[error("button {button} does not exist on {hardware} hardware")]
    ButtonNotOnHardware {
        hardware: HardwareType,
        button: Button,
    },

    #[error("the {0} entity list must not be empty")]
    EmptyEntityList(Domain),
}

/// Problems with an inbound raw button event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    #[error("unknown button {0:?}")]
    UnknownButton(String),

    #[error("unknown action {0:?}, expected press or release")]
    UnknownPhase(String),

    #[error("button {button} is not supported by {hardware} hardware")]
    UnsupportedButton {
        hardware: HardwareType,
        button: Button,
    },
}

/// Failure reported by an action executor.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The target entity does not exist anymore. Retrying is pointless.
    #[error("entity {entity_id} not found")]
    EntityNotFound { entity_id: String },

    /// The executor refused the call (unknown service, bad parameters, …).
    #[error("{action} rejected: {reason}")]
    Rejected { action: String, reason: String },

    /// The transport carrying the call failed.
    #[error("transport failure")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DispatchError {
    /// Whether the failure means the target is permanently gone.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::EntityNotFound { .. })
    }
}
