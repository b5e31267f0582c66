//! Device: one configured remote and everything needed to interpret it.
//!
//! Devices are built once at configuration load and are read-only
//! afterwards; the runtime shares them behind an `Arc` without locking.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::action::ActionSpec;
use crate::button::Button;
use crate::error::ValidationError;
use crate::id::DeviceId;
use crate::ramp::{BoundaryPolicy, Direction};

/// The four supported remote layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HardwareType {
    /// Two large paddles (on / off) with hold-to-dim.
    #[serde(rename = "P2B")]
    Paddle,
    /// Plain on / off remote.
    #[serde(rename = "2B")]
    TwoButton,
    /// On / off / raise / lower / stop.
    #[serde(rename = "3BRL")]
    FiveButton,
    /// Three scene buttons plus off, mapped to user actions.
    #[serde(rename = "4B")]
    Scene,
}

impl HardwareType {
    /// Buttons physically present on this hardware.
    #[must_use]
    pub fn buttons(self) -> &'static [Button] {
        match self {
            Self::Paddle | Self::TwoButton => &[Button::On, Button::Off],
            Self::FiveButton => &[
                Button::On,
                Button::Off,
                Button::Raise,
                Button::Lower,
                Button::Stop,
            ],
            Self::Scene => &[Button::Button1, Button::Button2, Button::Button3, Button::Off],
        }
    }

    #[must_use]
    pub fn supports(self, button: Button) -> bool {
        self.buttons().contains(&button)
    }

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Paddle => "P2B",
            Self::TwoButton => "2B",
            Self::FiveButton => "3BRL",
            Self::Scene => "4B",
        }
    }
}

impl fmt::Display for HardwareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The closed set of controllable entity categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Covers,
    Fans,
    Lights,
    MediaPlayers,
    Switches,
}

impl Domain {
    pub const ALL: [Self; 5] = [
        Self::Covers,
        Self::Fans,
        Self::Lights,
        Self::MediaPlayers,
        Self::Switches,
    ];

    /// The symbolic group token standing for a device's entity list.
    #[must_use]
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::Covers => "covers",
            Self::Fans => "fans",
            Self::Lights => "lights",
            Self::MediaPlayers => "media_players",
            Self::Switches => "switches",
        }
    }

    /// Service domain prefix used in action names.
    #[must_use]
    pub fn service_domain(self) -> &'static str {
        match self {
            Self::Covers => "cover",
            Self::Fans => "fan",
            Self::Lights => "light",
            Self::MediaPlayers => "media_player",
            Self::Switches => "switch",
        }
    }

    /// Look a domain up by its placeholder token.
    #[must_use]
    pub fn from_placeholder(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.placeholder() == token)
    }

    /// Whether raise/lower style ramping means anything for this domain.
    #[must_use]
    pub fn is_rampable(self) -> bool {
        !matches!(self, Self::Switches)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.placeholder())
    }
}

/// Entity identifiers grouped by domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityGroups {
    #[serde(default)]
    pub covers: Vec<String>,
    #[serde(default)]
    pub fans: Vec<String>,
    #[serde(default)]
    pub lights: Vec<String>,
    #[serde(default)]
    pub media_players: Vec<String>,
    #[serde(default)]
    pub switches: Vec<String>,
}

impl EntityGroups {
    #[must_use]
    pub fn get(&self, domain: Domain) -> &[String] {
        match domain {
            Domain::Covers => &self.covers,
            Domain::Fans => &self.fans,
            Domain::Lights => &self.lights,
            Domain::MediaPlayers => &self.media_players,
            Domain::Switches => &self.switches,
        }
    }

    fn get_mut(&mut self, domain: Domain) -> &mut Vec<String> {
        match domain {
            Domain::Covers => &mut self.covers,
            Domain::Fans => &mut self.fans,
            Domain::Lights => &mut self.lights,
            Domain::MediaPlayers => &mut self.media_players,
            Domain::Switches => &mut self.switches,
        }
    }

    /// Domains with at least one entity, in alphabetical order.
    pub fn populated(&self) -> impl Iterator<Item = Domain> + '_ {
        Domain::ALL
            .into_iter()
            .filter(|domain| !self.get(*domain).is_empty())
    }
}

/// Timing and ramp behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// How long a press must last to count as a hold.
    pub hold_time: Duration,
    /// Interval between ramp steps.
    pub step_time: Duration,
    pub boundary: BoundaryPolicy,
    /// Hard cap on ticks per ramp session.
    pub max_ramp_ticks: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            hold_time: Duration::from_millis(400),
            step_time: Duration::from_millis(750),
            boundary: BoundaryPolicy::Park,
            max_ramp_ticks: 100,
        }
    }
}

/// Per-domain levels, all expressed in percent unless noted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Levels {
    pub light_on_pct: u8,
    /// Lower clamp for light ramps.
    pub light_low_pct: u8,
    pub light_step_pct: u8,
    pub fan_on_pct: u8,
    /// Number of discrete fan speeds including off (4 or 6).
    pub fan_speeds: u8,
    pub cover_open_pos: u8,
    pub cover_step_pct: u8,
    pub media_player_vol_step: u8,
}

impl Default for Levels {
    fn default() -> Self {
        Self {
            light_on_pct: 100,
            light_low_pct: 5,
            light_step_pct: 10,
            fan_on_pct: 100,
            fan_speeds: 6,
            cover_open_pos: 100,
            cover_step_pct: 10,
            media_player_vol_step: 10,
        }
    }
}

/// How the STOP button of a five-button remote is configured.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MiddleButton {
    /// User-authored actions, used verbatim when non-empty.
    Explicit(ActionSpec),
    /// Defer to the global default, if one is configured.
    UseGlobalDefault,
    #[default]
    Unset,
}

/// How the classifier must treat one button of one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonBehavior {
    /// Act on press, ignore the release.
    Immediate,
    /// Wait `hold_time`: release first is a tap, otherwise ramp.
    HoldGated(Direction),
    /// Start ramping on press, stop on release.
    RampOnPress(Direction),
    /// Cancel every ramp of the device, then run the STOP chain.
    Stop,
}

/// A configured remote.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: DeviceId,
    pub hardware: HardwareType,
    /// `None` only for scene hardware.
    pub domain: Option<Domain>,
    pub entities: EntityGroups,
    /// Scene mappings; empty for other hardware.
    pub buttons: BTreeMap<Button, ActionSpec>,
    pub timing: Timing,
    pub levels: Levels,
    pub middle_button: MiddleButton,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Entities of the device's own domain.
    #[must_use]
    pub fn domain_entities(&self) -> &[String] {
        self.domain.map_or(&[], |domain| self.entities.get(domain))
    }

    /// First entity of the controlled domain; its state seeds ramps.
    #[must_use]
    pub fn primary_entity(&self) -> Option<&str> {
        self.domain_entities().first().map(String::as_str)
    }

    /// Classify `button` for this device. `None` means the button does not
    /// exist on the hardware or has no meaning for the controlled domain.
    #[must_use]
    pub fn behavior(&self, button: Button) -> Option<ButtonBehavior> {
        if !self.hardware.supports(button) {
            return None;
        }
        let rampable = self.domain.is_some_and(Domain::is_rampable);
        match (self.hardware, button) {
            (HardwareType::Scene | HardwareType::TwoButton, _) => Some(ButtonBehavior::Immediate),
            (HardwareType::Paddle, _) if !rampable => Some(ButtonBehavior::Immediate),
            (HardwareType::Paddle, Button::On) => Some(ButtonBehavior::HoldGated(Direction::Up)),
            (HardwareType::Paddle, _) => Some(ButtonBehavior::HoldGated(Direction::Down)),
            (HardwareType::FiveButton, Button::Stop) => Some(ButtonBehavior::Stop),
            (HardwareType::FiveButton, Button::Raise) if rampable => {
                Some(ButtonBehavior::RampOnPress(Direction::Up))
            }
            (HardwareType::FiveButton, Button::Lower) if rampable => {
                Some(ButtonBehavior::RampOnPress(Direction::Down))
            }
            (HardwareType::FiveButton, Button::On | Button::Off) => Some(ButtonBehavior::Immediate),
            (HardwareType::FiveButton, _) => None,
        }
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the identifier is empty, the domain
    /// assignment does not match the hardware, or a scene device maps no
    /// buttons (or maps buttons its hardware lacks).
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyDeviceId);
        }
        if self.hardware == HardwareType::Scene {
            if self.domain.is_some() || self.entities.populated().next().is_some() {
                return Err(ValidationError::DomainOnSceneDevice);
            }
            if self.buttons.is_empty() {
                return Err(ValidationError::NoSceneButtons);
            }
            if let Some(button) = self
                .buttons
                .keys()
                .find(|button| !self.hardware.supports(**button))
            {
                return Err(ValidationError::ButtonNotOnHardware {
                    hardware: self.hardware,
                    button: *button,
                });
            }
            return Ok(());
        }
        let Some(domain) = self.domain else {
            return Err(ValidationError::MissingDomain(self.hardware));
        };
        if self.entities.get(domain).is_empty() {
            return Err(ValidationError::EmptyEntityList(domain));
        }
        if let Some(other) = self.entities.populated().find(|d| *d != domain) {
            return Err(ValidationError::MultipleDomains {
                first: domain.min(other),
                second: domain.max(other),
            });
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Device`].
///
/// The domain is derived from whichever entity list is populated.
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    hardware: Option<HardwareType>,
    entities: EntityGroups,
    buttons: BTreeMap<Button, ActionSpec>,
    timing: Timing,
    levels: Levels,
    middle_button: MiddleButton,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<DeviceId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn hardware(mut self, hardware: HardwareType) -> Self {
        self.hardware = Some(hardware);
        self
    }

    /// Append entities to the list of `domain`.
    #[must_use]
    pub fn entities<I, S>(mut self, domain: Domain, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities
            .get_mut(domain)
            .extend(entities.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn scene_button(mut self, button: Button, actions: ActionSpec) -> Self {
        self.buttons.insert(button, actions);
        self
    }

    #[must_use]
    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    #[must_use]
    pub fn levels(mut self, levels: Levels) -> Self {
        self.levels = levels;
        self
    }

    #[must_use]
    pub fn middle_button(mut self, middle_button: MiddleButton) -> Self {
        self.middle_button = middle_button;
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// A middle-button setting is dropped for hardware without a STOP
    /// button, and scene mappings are dropped for non-scene hardware.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] if the assembled device breaks an
    /// invariant (see [`Device::validate`]).
    pub fn build(self) -> Result<Device, ValidationError> {
        let hardware = self.hardware.unwrap_or(HardwareType::FiveButton);
        let domain = if hardware == HardwareType::Scene {
            None
        } else {
            self.entities.populated().next()
        };
        let middle_button = if hardware == HardwareType::FiveButton {
            self.middle_button
        } else {
            MiddleButton::Unset
        };
        let buttons = if hardware == HardwareType::Scene {
            self.buttons
        } else {
            BTreeMap::new()
        };
        let device = Device {
            id: self.id.unwrap_or_else(|| DeviceId::new("")),
            hardware,
            domain,
            entities: self.entities,
            buttons,
            timing: self.timing,
            levels: self.levels,
            middle_button,
        };
        device.validate()?;
        Ok(device)
    }
}
