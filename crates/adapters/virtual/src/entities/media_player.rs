//! Virtual media player: power, volume and mute.

use picolink_domain::status::EntityStatus;

use super::{Params, required, unsupported};

/// A simulated media player. Volume is kept in percent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMediaPlayer {
    pub on: bool,
    pub volume_pct: u8,
    pub muted: bool,
}

impl Default for VirtualMediaPlayer {
    fn default() -> Self {
        Self {
            on: false,
            volume_pct: 30,
            muted: false,
        }
    }
}

impl VirtualMediaPlayer {
    pub(super) fn handle_service(&mut self, service: &str, data: &Params) -> Result<(), String> {
        match service {
            "turn_on" => self.on = true,
            "turn_off" => self.on = false,
            "volume_set" => {
                let level = required(data.get("volume_level").and_then(serde_json::Value::as_f64), "volume_level")?;
                if !(0.0..=1.0).contains(&level) {
                    return Err(format!("volume_level out of range: {level}"));
                }
                // within 0..=100 after the range check
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let pct = (level * 100.0).round() as u8;
                self.volume_pct = pct;
            }
            "volume_mute" => {
                self.muted = required(
                    data.get("is_volume_muted").and_then(serde_json::Value::as_bool),
                    "is_volume_muted",
                )?;
            }
            _ => return Err(unsupported(service)),
        }
        Ok(())
    }

    pub(super) fn status(&self) -> EntityStatus {
        EntityStatus {
            level: Some(self.volume_pct),
            fan_direction: None,
            is_muted: Some(self.muted),
        }
    }
}
