//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `picolink.toml` in the working directory, or at the path in
//! `PICOLINK_CONFIG`. A missing file yields an empty device list. Numeric
//! tunables are coerced into range rather than rejected; structural
//! problems reject the whole file.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use serde::Deserialize;

use picolink_domain::action::{ActionSpec, one_or_many};
use picolink_domain::button::Button;
use picolink_domain::device::{Device, Domain, HardwareType, Levels, MiddleButton, Timing};
use picolink_domain::error::ValidationError;
use picolink_domain::ramp::BoundaryPolicy;
use picolink_domain::stop_policy::GlobalDefaults;

const DEFAULT_PATH: &str = "picolink.toml";
const USE_GLOBAL_DEFAULT: &str = "default";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Settings merged under every device.
    pub defaults: DefaultsConfig,
    pub devices: Vec<DeviceConfig>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// The `[defaults]` table.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    #[serde(flatten)]
    pub tunables: Tunables,
    /// Shared STOP actions for devices whose `middle_button = "default"`.
    pub middle_button: Option<ActionSpec>,
}

/// Numeric and policy settings accepted both in `[defaults]` and per device.
/// Absent or `0` means "inherit / use the built-in default".
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Tunables {
    pub hold_time_ms: Option<i64>,
    pub step_time_ms: Option<i64>,
    pub ramp_boundary: Option<BoundaryPolicy>,
    pub max_ramp_ticks: Option<i64>,
    /// Shorthand for `light_on_pct` and `fan_on_pct`.
    pub on_pct: Option<i64>,
    /// Shorthand for `light_low_pct`.
    pub low_pct: Option<i64>,
    /// Shorthand for `light_step_pct`.
    pub step_pct: Option<i64>,
    pub light_on_pct: Option<i64>,
    pub light_low_pct: Option<i64>,
    pub light_step_pct: Option<i64>,
    pub fan_on_pct: Option<i64>,
    pub fan_speeds: Option<i64>,
    pub cover_open_pos: Option<i64>,
    pub cover_step_pct: Option<i64>,
    pub media_player_vol_step: Option<i64>,
}

/// One `[[devices]]` entry.
#[derive(Debug, Deserialize)]
pub struct DeviceConfig {
    pub device_id: String,
    #[serde(rename = "type")]
    pub hardware: HardwareType,
    #[serde(default, deserialize_with = "one_or_many")]
    pub covers: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub fans: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub lights: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub media_players: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub switches: Vec<String>,
    /// Scene mappings, keyed by button name.
    #[serde(default)]
    pub buttons: BTreeMap<String, ActionSpec>,
    #[serde(default)]
    pub middle_button: Option<MiddleButtonConfig>,
    #[serde(flatten)]
    pub tunables: Tunables,
}

/// `middle_button` is either the string `"default"` or a list of actions.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MiddleButtonConfig {
    Keyword(String),
    Actions(ActionSpec),
}

/// Devices and shared settings ready for the controller.
#[derive(Debug)]
pub struct Runtime {
    pub devices: Vec<Device>,
    pub globals: GlobalDefaults,
}

impl Config {
    /// Load configuration from `PICOLINK_CONFIG` or `picolink.toml` (if
    /// present) then apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("PICOLINK_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown
    /// hardware types.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_toml(&content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PICOLINK_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    /// Validate every device and build the runtime records.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Device`] for the first invalid device and
    /// [`ConfigError::Validation`] for file-level problems such as
    /// duplicate identifiers.
    pub fn into_runtime(self) -> Result<Runtime, ConfigError> {
        let mut seen = HashSet::new();
        let mut devices = Vec::with_capacity(self.devices.len());
        for (index, entry) in self.devices.into_iter().enumerate() {
            if !seen.insert(entry.device_id.clone()) {
                return Err(ConfigError::Validation(format!(
                    "device {} is defined twice",
                    entry.device_id
                )));
            }
            let tunables = entry.tunables.merged_over(&self.defaults.tunables);
            devices.push(entry.into_device(index, &tunables)?);
        }
        let globals = GlobalDefaults {
            middle_button: self.defaults.middle_button.filter(|spec| !spec.is_empty()),
        };
        Ok(Runtime { devices, globals })
    }
}

impl DeviceConfig {
    fn into_device(self, index: usize, tunables: &Tunables) -> Result<Device, ConfigError> {
        let invalid = |source| ConfigError::Device { index, source };
        let middle_button = match self.middle_button {
            None => MiddleButton::Unset,
            Some(MiddleButtonConfig::Keyword(word)) if word == USE_GLOBAL_DEFAULT => {
                MiddleButton::UseGlobalDefault
            }
            Some(MiddleButtonConfig::Keyword(word)) => {
                return Err(ConfigError::Validation(format!(
                    "device {}: middle_button must be \"{USE_GLOBAL_DEFAULT}\" or a list of actions, got {word:?}",
                    self.device_id
                )));
            }
            Some(MiddleButtonConfig::Actions(spec)) => MiddleButton::Explicit(spec),
        };
        if middle_button != MiddleButton::Unset && self.hardware != HardwareType::FiveButton {
            tracing::warn!(device_id = %self.device_id, hardware = %self.hardware, "middle_button ignored");
        }

        let mut builder = Device::builder()
            .id(self.device_id.as_str())
            .hardware(self.hardware)
            .entities(Domain::Covers, self.covers)
            .entities(Domain::Fans, self.fans)
            .entities(Domain::Lights, self.lights)
            .entities(Domain::MediaPlayers, self.media_players)
            .entities(Domain::Switches, self.switches)
            .timing(tunables.timing())
            .levels(tunables.levels())
            .middle_button(middle_button);
        for (name, actions) in self.buttons {
            let button: Button = name.parse().map_err(|_| {
                ConfigError::Validation(format!(
                    "device {}: unknown button {name:?}",
                    self.device_id
                ))
            })?;
            if !self.hardware.supports(button) {
                return Err(invalid(ValidationError::ButtonNotOnHardware {
                    hardware: self.hardware,
                    button,
                }));
            }
            builder = builder.scene_button(button, actions);
        }
        builder.build().map_err(invalid)
    }
}

impl Tunables {
    /// Per-field `self` first, `base` second.
    #[must_use]
    pub fn merged_over(&self, base: &Self) -> Self {
        Self {
            hold_time_ms: self.hold_time_ms.or(base.hold_time_ms),
            step_time_ms: self.step_time_ms.or(base.step_time_ms),
            ramp_boundary: self.ramp_boundary.or(base.ramp_boundary),
            max_ramp_ticks: self.max_ramp_ticks.or(base.max_ramp_ticks),
            on_pct: self.on_pct.or(base.on_pct),
            low_pct: self.low_pct.or(base.low_pct),
            step_pct: self.step_pct.or(base.step_pct),
            light_on_pct: self.light_on_pct.or(base.light_on_pct),
            light_low_pct: self.light_low_pct.or(base.light_low_pct),
            light_step_pct: self.light_step_pct.or(base.light_step_pct),
            fan_on_pct: self.fan_on_pct.or(base.fan_on_pct),
            fan_speeds: self.fan_speeds.or(base.fan_speeds),
            cover_open_pos: self.cover_open_pos.or(base.cover_open_pos),
            cover_step_pct: self.cover_step_pct.or(base.cover_step_pct),
            media_player_vol_step: self.media_player_vol_step.or(base.media_player_vol_step),
        }
    }

    #[must_use]
    pub fn timing(&self) -> Timing {
        Timing {
            hold_time: Duration::from_millis(coerce(self.hold_time_ms, 400, 100, 2000)),
            step_time: Duration::from_millis(coerce(self.step_time_ms, 750, 100, 2000)),
            boundary: self.ramp_boundary.unwrap_or_default(),
            max_ramp_ticks: u32::try_from(coerce(self.max_ramp_ticks, 100, 1, 10_000)).unwrap_or(100),
        }
    }

    #[must_use]
    pub fn levels(&self) -> Levels {
        let pct = |value: Option<i64>, default: u8, min: u8, max: u8| {
            u8::try_from(coerce(value, default.into(), min.into(), max.into())).unwrap_or(default)
        };
        let fan_speeds = match self.fan_speeds {
            Some(4) => 4,
            _ => 6,
        };
        Levels {
            light_on_pct: pct(self.light_on_pct.or(self.on_pct), 100, 1, 100),
            light_low_pct: pct(self.light_low_pct.or(self.low_pct), 5, 1, 99),
            light_step_pct: pct(self.light_step_pct.or(self.step_pct), 10, 1, 25),
            fan_on_pct: pct(self.fan_on_pct.or(self.on_pct), 100, 1, 100),
            fan_speeds,
            cover_open_pos: pct(self.cover_open_pos, 100, 1, 100),
            cover_step_pct: pct(self.cover_step_pct, 10, 1, 25),
            media_player_vol_step: pct(self.media_player_vol_step, 10, 1, 20),
        }
    }
}

/// `None` or `0` yields `default`, anything else is clamped to `[min, max]`.
fn coerce(value: Option<i64>, default: u64, min: u64, max: u64) -> u64 {
    match value {
        None | Some(0) => default,
        Some(v) => u64::try_from(v).unwrap_or(min).clamp(min, max),
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "picolinkd=info,picolink_app=info,picolink_adapter_virtual=info".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// A device breaks a domain invariant.
    #[error("device #{index} is invalid")]
    Device {
        index: usize,
        #[source]
        source: ValidationError,
    },
}
