//! Virtual light: `turn_on` (optionally with `brightness_pct`), `turn_off`, `toggle`.

use picolink_domain::status::EntityStatus;

use super::{Params, percent, unsupported};

/// A simulated dimmable light.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualLight {
    pub on: bool,
    /// Brightness restored by a plain `turn_on`.
    pub brightness_pct: u8,
}

impl Default for VirtualLight {
    fn default() -> Self {
        Self {
            on: false,
            brightness_pct: 100,
        }
    }
}

impl VirtualLight {
    pub(super) fn handle_service(&mut self, service: &str, data: &Params) -> Result<(), String> {
        match service {
            "turn_on" => {
                if let Some(brightness) = percent(data, "brightness_pct")? {
                    self.brightness_pct = brightness;
                }
                self.on = self.brightness_pct > 0;
            }
            "turn_off" => self.on = false,
            "toggle" => self.on = !self.on,
            _ => return Err(unsupported(service)),
        }
        Ok(())
    }

    pub(super) fn status(&self) -> EntityStatus {
        EntityStatus::with_level(if self.on { self.brightness_pct } else { 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brightness(pct: u8) -> Params {
        let mut data = Params::new();
        data.insert("brightness_pct".to_string(), pct.into());
        data
    }

    #[test]
    fn should_default_to_off() {
        assert_eq!(VirtualLight::default().status().level, Some(0));
    }

    #[test]
    fn should_turn_on_at_requested_brightness() {
        let mut light = VirtualLight::default();
        light.handle_service("turn_on", &brightness(35)).unwrap();
        assert_eq!(light.status().level, Some(35));
    }

    #[test]
    fn should_restore_last_brightness_on_plain_turn_on() {
        let mut light = VirtualLight::default();
        light.handle_service("turn_on", &brightness(35)).unwrap();
        light.handle_service("turn_off", &Params::new()).unwrap();
        light.handle_service("turn_on", &Params::new()).unwrap();
        assert_eq!(light.status().level, Some(35));
    }

    #[test]
    fn should_toggle_from_off_to_on() {
        let mut light = VirtualLight::default();
        light.handle_service("toggle", &Params::new()).unwrap();
        assert!(light.on);
    }

    #[test]
    fn should_reject_unknown_service() {
        let mut light = VirtualLight::default();
        assert!(light.handle_service("set_color", &Params::new()).is_err());
    }
}
