//! Virtual fan: speed percentage and rotation direction.

use picolink_domain::status::{EntityStatus, FanDirection};

use super::{Params, percent, required, unsupported};

/// A simulated ceiling fan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFan {
    pub percentage: u8,
    pub direction: FanDirection,
}

impl Default for VirtualFan {
    fn default() -> Self {
        Self {
            percentage: 0,
            direction: FanDirection::Forward,
        }
    }
}

impl VirtualFan {
    pub(super) fn handle_service(&mut self, service: &str, data: &Params) -> Result<(), String> {
        match service {
            "turn_on" => self.percentage = percent(data, "percentage")?.unwrap_or(100),
            "turn_off" => self.percentage = 0,
            "set_percentage" => {
                self.percentage = required(percent(data, "percentage")?, "percentage")?;
            }
            "set_direction" => {
                self.direction = match data.get("direction").and_then(serde_json::Value::as_str) {
                    Some("forward") => FanDirection::Forward,
                    Some("reverse") => FanDirection::Reverse,
                    other => return Err(format!("invalid direction {other:?}")),
                };
            }
            _ => return Err(unsupported(service)),
        }
        Ok(())
    }

    pub(super) fn status(&self) -> EntityStatus {
        EntityStatus {
            level: Some(self.percentage),
            fan_direction: Some(self.direction),
            is_muted: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: serde_json::Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn should_set_percentage() {
        let mut fan = VirtualFan::default();
        fan.handle_service("set_percentage", &params(serde_json::json!({"percentage": 60})))
            .unwrap();
        assert_eq!(fan.status().level, Some(60));
    }

    #[test]
    fn should_require_percentage_for_set_percentage() {
        let mut fan = VirtualFan::default();
        assert_eq!(
            fan.handle_service("set_percentage", &Params::new()),
            Err("missing percentage".to_string())
        );
    }

    #[test]
    fn should_change_direction() {
        let mut fan = VirtualFan::default();
        fan.handle_service("set_direction", &params(serde_json::json!({"direction": "reverse"})))
            .unwrap();
        assert_eq!(fan.status().fan_direction, Some(FanDirection::Reverse));
    }

    #[test]
    fn should_reject_unknown_direction() {
        let mut fan = VirtualFan::default();
        let data = params(serde_json::json!({"direction": "sideways"}));
        assert!(fan.handle_service("set_direction", &data).is_err());
    }
}
