//! Action resolution and the per-domain default table.
//!
//! Resolution is a pure function of the device, the button and an optional
//! state snapshot. Targets are emitted as domain placeholder tokens and are
//! expanded at dispatch time like user-authored actions.

use crate::action::{ActionCall, ActionSpec};
use crate::button::Button;
use crate::device::{Device, Domain, HardwareType, Levels};
use crate::status::EntityStatus;

/// The fixed commands covered by the default table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    On,
    Off,
    Stop,
}

impl Command {
    #[must_use]
    pub fn from_button(button: Button) -> Option<Self> {
        match button {
            Button::On => Some(Self::On),
            Button::Off => Some(Self::Off),
            Button::Stop => Some(Self::Stop),
            _ => None,
        }
    }
}

/// Resolve a discrete press.
///
/// Scene hardware returns the mapped list verbatim, or a no-op for an
/// unmapped button. Other hardware goes through the default table; raise
/// and lower resolve to a no-op here because they are realised as repeated
/// [`step_action`] calls.
#[must_use]
pub fn resolve(device: &Device, button: Button, status: Option<&EntityStatus>) -> ActionSpec {
    if device.hardware == HardwareType::Scene {
        return device.buttons.get(&button).cloned().unwrap_or_default();
    }
    match (device.domain, Command::from_button(button)) {
        (Some(domain), Some(command)) => domain_default(domain, command, &device.levels, status),
        _ => ActionSpec::noop(),
    }
}

/// One entry of the default table.
#[must_use]
pub fn domain_default(
    domain: Domain,
    command: Command,
    levels: &Levels,
    status: Option<&EntityStatus>,
) -> ActionSpec {
    let token = [domain.placeholder()];
    let call = |service: &str| ActionCall::new(format!("{}.{service}", domain.service_domain()), token);
    match (domain, command) {
        (Domain::Lights, Command::On) => {
            ActionSpec::single(call("turn_on").with_data("brightness_pct", levels.light_on_pct))
        }
        (Domain::Fans, Command::On) => {
            ActionSpec::single(call("set_percentage").with_data("percentage", levels.fan_on_pct))
        }
        // Without a known direction there is nothing to flip.
        (Domain::Fans, Command::Stop) => match status.and_then(|s| s.fan_direction) {
            Some(direction) => ActionSpec::single(
                call("set_direction").with_data("direction", direction.flipped().as_str()),
            ),
            None => ActionSpec::noop(),
        },
        (Domain::Covers, Command::On) if levels.cover_open_pos >= 100 => {
            ActionSpec::single(call("open_cover"))
        }
        (Domain::Covers, Command::On) => ActionSpec::single(
            call("set_cover_position").with_data("position", levels.cover_open_pos),
        ),
        (Domain::Covers, Command::Off) => ActionSpec::single(call("close_cover")),
        (Domain::Covers, Command::Stop) => ActionSpec::single(call("stop_cover")),
        (Domain::MediaPlayers, Command::On) => ActionSpec::new(vec![
            call("turn_on"),
            call("volume_mute").with_data("is_volume_muted", false),
        ]),
        (Domain::MediaPlayers, Command::Off) => ActionSpec::new(vec![
            call("turn_off"),
            call("volume_mute").with_data("is_volume_muted", true),
        ]),
        (Domain::MediaPlayers, Command::Stop) => {
            let muted = status.and_then(|s| s.is_muted).unwrap_or(false);
            ActionSpec::single(call("volume_mute").with_data("is_volume_muted", !muted))
        }
        (Domain::Switches, Command::On) => ActionSpec::single(call("turn_on")),
        (Domain::Lights | Domain::Fans | Domain::Switches, Command::Off) => {
            ActionSpec::single(call("turn_off"))
        }
        (Domain::Lights | Domain::Switches, Command::Stop) => ActionSpec::noop(),
    }
}

/// The single step command setting the device's domain to `value` percent.
/// `None` for domains without a level.
#[must_use]
pub fn step_action(device: &Device, value: u8) -> Option<ActionSpec> {
    let domain = device.domain?;
    let token = [domain.placeholder()];
    let call = match domain {
        Domain::Lights => ActionCall::new("light.turn_on", token).with_data("brightness_pct", value),
        Domain::Fans => ActionCall::new("fan.set_percentage", token).with_data("percentage", value),
        Domain::Covers => {
            ActionCall::new("cover.set_cover_position", token).with_data("position", value)
        }
        Domain::MediaPlayers => ActionCall::new("media_player.volume_set", token)
            .with_data("volume_level", f64::from(value) / 100.0),
        Domain::Switches => return None,
    };
    Some(ActionSpec::single(call))
}
