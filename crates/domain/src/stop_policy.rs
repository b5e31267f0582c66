//! STOP precedence chain for five-button remotes.
//!
//! Ramp cancellation is the caller's job and must finish before
//! [`resolve_stop`] runs; this module only picks the actions.

use std::fmt;

use crate::action::ActionSpec;
use crate::device::{Device, MiddleButton};
use crate::resolver::{Command, domain_default};
use crate::status::EntityStatus;

/// Settings shared by every device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalDefaults {
    /// Middle-button actions for devices that opted into the shared default.
    pub middle_button: Option<ActionSpec>,
}

/// Which rung of the chain produced the actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSource {
    Explicit,
    GlobalDefault,
    DomainDefault,
}

impl fmt::Display for StopSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => f.write_str("explicit"),
            Self::GlobalDefault => f.write_str("global default"),
            Self::DomainDefault => f.write_str("domain default"),
        }
    }
}

/// Outcome of the chain. Never an error; `actions` may be a no-op.
#[derive(Debug, Clone, PartialEq)]
pub struct StopResolution {
    pub source: StopSource,
    pub actions: ActionSpec,
}

/// Walk the chain: explicit non-empty list, then the global default when
/// the device asks for it, then the domain default.
#[must_use]
pub fn resolve_stop(
    device: &Device,
    globals: &GlobalDefaults,
    status: Option<&EntityStatus>,
) -> StopResolution {
    let chosen = match &device.middle_button {
        MiddleButton::Explicit(actions) if !actions.is_empty() => {
            Some((StopSource::Explicit, actions))
        }
        MiddleButton::UseGlobalDefault => globals
            .middle_button
            .as_ref()
            .filter(|actions| !actions.is_empty())
            .map(|actions| (StopSource::GlobalDefault, actions)),
        _ => None,
    };
    if let Some((source, actions)) = chosen {
        return StopResolution {
            source,
            actions: actions.clone(),
        };
    }
    let actions = device.domain.map_or_else(ActionSpec::noop, |domain| {
        domain_default(domain, Command::Stop, &device.levels, status)
    });
    StopResolution {
        source: StopSource::DomainDefault,
        actions,
    }
}
