//! Read-only snapshot of an entity's current state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fan rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanDirection {
    Forward,
    Reverse,
}

impl FanDirection {
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Forward => Self::Reverse,
            Self::Reverse => Self::Forward,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Reverse => "reverse",
        }
    }
}

impl fmt::Display for FanDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What is known about an entity right now. Every field is optional; an
/// unknown value makes the resolvers fall back to a fixed choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStatus {
    /// Brightness, fan percentage, cover position or volume, in percent.
    #[serde(default)]
    pub level: Option<u8>,
    #[serde(default)]
    pub fan_direction: Option<FanDirection>,
    #[serde(default)]
    pub is_muted: Option<bool>,
}

impl EntityStatus {
    #[must_use]
    pub fn with_level(level: u8) -> Self {
        Self {
            level: Some(level),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_flip_fan_direction() {
        assert_eq!(FanDirection::Forward.flipped(), FanDirection::Reverse);
        assert_eq!(FanDirection::Reverse.flipped(), FanDirection::Forward);
    }

    #[test]
    fn should_deserialize_partial_status() {
        let status: EntityStatus =
            serde_json::from_value(serde_json::json!({"fan_direction": "reverse"})).unwrap();
        assert_eq!(status.fan_direction, Some(FanDirection::Reverse));
        assert_eq!(status.level, None);
    }
}
