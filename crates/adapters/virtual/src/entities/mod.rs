//! Simulated entities: light, fan, cover, media player, switch.
//!
//! The kind of an entity follows from its identifier prefix (`light.`,
//! `fan.`, ...). Anything else becomes a [`VirtualEntity::Other`] that
//! accepts every service of its own domain and keeps no state.

mod cover;
mod fan;
mod light;
mod media_player;
mod switch;

pub use cover::VirtualCover;
pub use fan::VirtualFan;
pub use light::VirtualLight;
pub use media_player::VirtualMediaPlayer;
pub use switch::VirtualSwitch;

use serde_json::{Map, Value};

use picolink_domain::status::EntityStatus;

/// Service parameters as carried by an action call.
pub type Params = Map<String, Value>;

/// Wrapper enum for the concrete simulated entity types.
#[derive(Debug, Clone, PartialEq)]
pub enum VirtualEntity {
    Light(VirtualLight),
    Fan(VirtualFan),
    Cover(VirtualCover),
    MediaPlayer(VirtualMediaPlayer),
    Switch(VirtualSwitch),
    Other { domain: String },
}

impl VirtualEntity {
    /// Create an entity in its default (off, closed, silent) state.
    #[must_use]
    pub fn for_entity_id(entity_id: &str) -> Self {
        let domain = entity_id.split_once('.').map_or(entity_id, |(domain, _)| domain);
        match domain {
            "light" => Self::Light(VirtualLight::default()),
            "fan" => Self::Fan(VirtualFan::default()),
            "cover" => Self::Cover(VirtualCover::default()),
            "media_player" => Self::MediaPlayer(VirtualMediaPlayer::default()),
            "switch" => Self::Switch(VirtualSwitch::default()),
            other => Self::Other {
                domain: other.to_string(),
            },
        }
    }

    /// Service domain this entity answers to.
    #[must_use]
    pub fn domain(&self) -> &str {
        match self {
            Self::Light(_) => "light",
            Self::Fan(_) => "fan",
            Self::Cover(_) => "cover",
            Self::MediaPlayer(_) => "media_player",
            Self::Switch(_) => "switch",
            Self::Other { domain } => domain,
        }
    }

    /// Apply `service`. The error is a human-readable rejection reason.
    ///
    /// # Errors
    ///
    /// Fails for services the entity does not offer or malformed parameters.
    pub fn handle_service(&mut self, service: &str, data: &Params) -> Result<(), String> {
        match self {
            Self::Light(e) => e.handle_service(service, data),
            Self::Fan(e) => e.handle_service(service, data),
            Self::Cover(e) => e.handle_service(service, data),
            Self::MediaPlayer(e) => e.handle_service(service, data),
            Self::Switch(e) => e.handle_service(service),
            Self::Other { .. } => Ok(()),
        }
    }

    #[must_use]
    pub fn status(&self) -> EntityStatus {
        match self {
            Self::Light(e) => e.status(),
            Self::Fan(e) => e.status(),
            Self::Cover(e) => e.status(),
            Self::MediaPlayer(e) => e.status(),
            Self::Switch(_) | Self::Other { .. } => EntityStatus::default(),
        }
    }
}

fn unsupported(service: &str) -> String {
    format!("unsupported service {service:?}")
}

/// Read an optional percentage, accepting integers or floats.
fn percent(data: &Params, key: &str) -> Result<Option<u8>, String> {
    let Some(value) = data.get(key) else {
        return Ok(None);
    };
    let Some(number) = value.as_f64() else {
        return Err(format!("{key} must be a number"));
    };
    if !(0.0..=100.0).contains(&number) {
        return Err(format!("{key} out of range: {number}"));
    }
    // within 0..=100 after the range check
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let pct = number.round() as u8;
    Ok(Some(pct))
}

fn required<T>(value: Option<T>, key: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("missing {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn should_pick_kind_from_entity_prefix() {
        assert!(matches!(VirtualEntity::for_entity_id("light.a"), VirtualEntity::Light(_)));
        assert!(matches!(
            VirtualEntity::for_entity_id("media_player.tv"),
            VirtualEntity::MediaPlayer(_)
        ));
        assert_eq!(VirtualEntity::for_entity_id("scene.movie").domain(), "scene");
    }

    #[test]
    fn should_read_integer_and_float_percentages() {
        let data = params(serde_json::json!({"a": 40, "b": 33.4}));
        assert_eq!(percent(&data, "a"), Ok(Some(40)));
        assert_eq!(percent(&data, "b"), Ok(Some(33)));
        assert_eq!(percent(&data, "c"), Ok(None));
    }

    #[test]
    fn should_reject_out_of_range_percentage() {
        let data = params(serde_json::json!({"a": 140}));
        assert!(percent(&data, "a").is_err());
    }

    #[test]
    fn should_accept_any_service_for_other_domains() {
        let mut scene = VirtualEntity::for_entity_id("scene.movie");
        assert!(scene.handle_service("turn_on", &Params::new()).is_ok());
        assert_eq!(scene.status(), EntityStatus::default());
    }
}
