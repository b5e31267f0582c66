//! Virtual switch: responds to `turn_on`, `turn_off`, `toggle`.

use super::unsupported;

/// A simulated on/off switch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualSwitch {
    pub on: bool,
}

impl VirtualSwitch {
    pub(super) fn handle_service(&mut self, service: &str) -> Result<(), String> {
        match service {
            "turn_on" => self.on = true,
            "turn_off" => self.on = false,
            "toggle" => self.on = !self.on,
            _ => return Err(unsupported(service)),
        }
        Ok(())
    }
}
