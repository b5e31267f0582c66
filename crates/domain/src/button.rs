//! Buttons and the transient events they produce.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EventError;
use crate::id::DeviceId;
use crate::time::{Timestamp, now};

/// Every physical button found across the supported hardware family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    On,
    Off,
    Raise,
    Lower,
    Stop,
    #[serde(rename = "button_1")]
    Button1,
    #[serde(rename = "button_2")]
    Button2,
    #[serde(rename = "button_3")]
    Button3,
}

impl Button {
    pub const ALL: [Self; 8] = [
        Self::On,
        Self::Off,
        Self::Raise,
        Self::Lower,
        Self::Stop,
        Self::Button1,
        Self::Button2,
        Self::Button3,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Raise => "raise",
            Self::Lower => "lower",
            Self::Stop => "stop",
            Self::Button1 => "button_1",
            Self::Button2 => "button_2",
            Self::Button3 => "button_3",
        }
    }

    /// The button driving the opposite direction, if any.
    #[must_use]
    pub fn opposite(self) -> Option<Self> {
        match self {
            Self::On => Some(Self::Off),
            Self::Off => Some(Self::On),
            Self::Raise => Some(Self::Lower),
            Self::Lower => Some(Self::Raise),
            Self::Stop | Self::Button1 | Self::Button2 | Self::Button3 => None,
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Button {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|button| button.as_str() == lowered)
            .ok_or_else(|| EventError::UnknownButton(s.to_string()))
    }
}

/// Whether the button went down or came back up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Press,
    Release,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Press => f.write_str("press"),
            Self::Release => f.write_str("release"),
        }
    }
}

impl FromStr for Phase {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "press" => Ok(Self::Press),
            "release" => Ok(Self::Release),
            _ => Err(EventError::UnknownPhase(s.to_string())),
        }
    }
}

/// A single press or release, consumed once by the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonEvent {
    pub device_id: DeviceId,
    pub button: Button,
    pub phase: Phase,
    pub timestamp: Timestamp,
}

impl ButtonEvent {
    #[must_use]
    pub fn new(device_id: DeviceId, button: Button, phase: Phase) -> Self {
        Self {
            device_id,
            button,
            phase,
            timestamp: now(),
        }
    }

    #[must_use]
    pub fn press(device_id: impl Into<DeviceId>, button: Button) -> Self {
        Self::new(device_id.into(), button, Phase::Press)
    }

    #[must_use]
    pub fn release(device_id: impl Into<DeviceId>, button: Button) -> Self {
        Self::new(device_id.into(), button, Phase::Release)
    }
}

/// Event payload as emitted by the bridge, before any interpretation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawButtonEvent {
    pub device_id: String,
    pub button_type: String,
    pub action: String,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
}

impl TryFrom<RawButtonEvent> for ButtonEvent {
    type Error = EventError;

    fn try_from(raw: RawButtonEvent) -> Result<Self, Self::Error> {
        let button = raw.button_type.parse()?;
        let phase = raw.action.parse()?;
        Ok(Self {
            device_id: DeviceId::new(raw.device_id),
            button,
            phase,
            timestamp: raw.timestamp.unwrap_or_else(now),
        })
    }
}
