//! Virtual cover: position between 0 (closed) and 100 (open).

use picolink_domain::status::EntityStatus;

use super::{Params, percent, required, unsupported};

/// A simulated blind or shade. Movement is instantaneous.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualCover {
    pub position: u8,
}

impl VirtualCover {
    pub(super) fn handle_service(&mut self, service: &str, data: &Params) -> Result<(), String> {
        match service {
            "open_cover" => self.position = 100,
            "close_cover" => self.position = 0,
            "stop_cover" => {}
            "set_cover_position" => {
                self.position = required(percent(data, "position")?, "position")?;
            }
            _ => return Err(unsupported(service)),
        }
        Ok(())
    }

    pub(super) fn status(&self) -> EntityStatus {
        EntityStatus::with_level(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_open_and_close() {
        let mut cover = VirtualCover::default();
        cover.handle_service("open_cover", &Params::new()).unwrap();
        assert_eq!(cover.position, 100);
        cover.handle_service("close_cover", &Params::new()).unwrap();
        assert_eq!(cover.position, 0);
    }

    #[test]
    fn should_keep_position_on_stop() {
        let mut cover = VirtualCover { position: 40 };
        cover.handle_service("stop_cover", &Params::new()).unwrap();
        assert_eq!(cover.status().level, Some(40));
    }
}
