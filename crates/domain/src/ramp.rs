//! Ramp arithmetic: step rules, clamping and the per-session tick state.
//!
//! Everything here is synchronous and deterministic; the scheduler in the
//! `app` crate owns the timers and calls [`RampSession::next_tick`] once per
//! interval.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::button::Button;
use crate::device::{Device, Domain};
use crate::id::{DeviceId, SessionId};
use crate::time::Timestamp;

/// Ramp direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
        }
    }
}

/// What a session does once a tick would not change the value anymore.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPolicy {
    /// Stay alive, suppress duplicate dispatches until the value moves.
    #[default]
    Park,
    /// End the session.
    Stop,
}

/// How one tick moves a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepRule {
    /// Add or subtract `step`, clamped to `[min, max]`.
    Linear { step: u8, min: u8, max: u8 },
    /// Move to the neighbouring rung of a sorted ladder.
    Ladder(Vec<u8>),
}

impl StepRule {
    /// The rule for the device's domain, `None` when the domain has no
    /// notion of level.
    #[must_use]
    pub fn for_device(device: &Device) -> Option<Self> {
        let levels = &device.levels;
        match device.domain? {
            Domain::Lights => Some(Self::Linear {
                step: levels.light_step_pct,
                min: levels.light_low_pct,
                max: 100,
            }),
            Domain::Fans => Some(Self::Ladder(speed_ladder(levels.fan_speeds))),
            Domain::Covers => Some(Self::Linear {
                step: levels.cover_step_pct,
                min: 0,
                max: 100,
            }),
            Domain::MediaPlayers => Some(Self::Linear {
                step: levels.media_player_vol_step,
                min: 0,
                max: 100,
            }),
            Domain::Switches => None,
        }
    }

    /// Inclusive clamp bounds.
    #[must_use]
    pub fn bounds(&self) -> (u8, u8) {
        match self {
            Self::Linear { min, max, .. } => (*min, *max),
            Self::Ladder(rungs) => (
                rungs.first().copied().unwrap_or(0),
                rungs.last().copied().unwrap_or(100),
            ),
        }
    }

    /// Value after one step from `current`. Always within [`bounds`](Self::bounds).
    #[must_use]
    pub fn next(&self, current: u8, direction: Direction) -> u8 {
        match self {
            Self::Linear { step, min, max } => {
                let current = i16::from(current);
                let step = i16::from(*step);
                let moved = match direction {
                    Direction::Up => current + step,
                    Direction::Down => current - step,
                };
                let clamped = moved.clamp(i16::from(*min), i16::from(*max));
                u8::try_from(clamped).unwrap_or(*max)
            }
            Self::Ladder(rungs) => {
                let Some(index) = nearest_rung(rungs, current) else {
                    return current;
                };
                let target = match direction {
                    Direction::Up => (index + 1).min(rungs.len() - 1),
                    Direction::Down => index.saturating_sub(1),
                };
                rungs[target]
            }
        }
    }
}

/// Evenly spaced percentages for a fan with `speeds` settings, off included.
/// Anything but 4 or 6 falls back to 6.
#[must_use]
pub fn speed_ladder(speeds: u8) -> Vec<u8> {
    let speeds: u16 = if matches!(speeds, 4 | 6) { speeds.into() } else { 6 };
    let intervals = speeds - 1;
    (0..speeds)
        .map(|i| {
            let pct = (i * 100 + intervals / 2) / intervals;
            u8::try_from(pct).unwrap_or(100)
        })
        .collect()
}

fn nearest_rung(rungs: &[u8], value: u8) -> Option<usize> {
    rungs
        .iter()
        .enumerate()
        .min_by_key(|(_, rung)| rung.abs_diff(value))
        .map(|(index, _)| index)
}

/// Why a ramp session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Released,
    /// A STOP press on the same device.
    Stopped,
    /// The opposite direction was pressed.
    Opposed,
    /// A new session replaced this one for the same key.
    Superseded,
    Boundary,
    TickLimit,
    /// The executor reported the target as gone.
    EntityGone,
    /// No value to start from: the target's state is unknown.
    UnknownState,
    Shutdown,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Released => "released",
            Self::Stopped => "stopped",
            Self::Opposed => "opposed",
            Self::Superseded => "superseded",
            Self::Boundary => "boundary",
            Self::TickLimit => "tick limit",
            Self::EntityGone => "entity gone",
            Self::UnknownState => "unknown state",
            Self::Shutdown => "shutdown",
        };
        f.write_str(text)
    }
}

/// Outcome of one scheduled tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Dispatch a step to this value, then [`commit`](RampSession::commit).
    Emit(u8),
    /// Nothing to dispatch, keep ticking.
    Suppress,
    /// End the session.
    Finish(EndReason),
}

/// A live ramp for one `(device, button)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RampSession {
    pub id: SessionId,
    pub device_id: DeviceId,
    pub button: Button,
    pub direction: Direction,
    pub started_at: Timestamp,
    pub last_tick_at: Option<Timestamp>,
    pub active: bool,
    /// Last value this session emitted (or adopted).
    pub current: Option<u8>,
    /// Steps emitted so far. Suppressed ticks while parked do not count.
    pub ticks: u32,
    /// Sitting at a bound with dispatches suppressed.
    pub parked: bool,
}

impl RampSession {
    #[must_use]
    pub fn new(device_id: DeviceId, button: Button, direction: Direction, started_at: Timestamp) -> Self {
        Self {
            id: SessionId::new(),
            device_id,
            button,
            direction,
            started_at,
            last_tick_at: None,
            active: true,
            current: None,
            ticks: 0,
            parked: false,
        }
    }

    /// Decide what the next tick does.
    ///
    /// `observed` is the latest known value of the target; it seeds the
    /// first tick and lets a parked session resume after an external
    /// change. It is ignored while the session is moving. A session with
    /// neither its own value nor an observation ends rather than guess.
    /// `max_ticks` caps emitted steps only, so a parked session stays alive
    /// for as long as the button is held.
    pub fn next_tick(
        &mut self,
        rule: &StepRule,
        policy: BoundaryPolicy,
        max_ticks: u32,
        observed: Option<u8>,
    ) -> TickDecision {
        if !self.active {
            return TickDecision::Suppress;
        }
        if self.ticks >= max_ticks {
            return TickDecision::Finish(EndReason::TickLimit);
        }

        if self.parked {
            match observed {
                Some(value) if Some(value) != self.current => {
                    self.current = Some(value);
                    self.parked = false;
                }
                _ => return TickDecision::Suppress,
            }
        }

        let Some(current) = self.current.or(observed) else {
            return TickDecision::Finish(EndReason::UnknownState);
        };
        let next = rule.next(current, self.direction);
        if next == current {
            self.current = Some(current);
            return match policy {
                BoundaryPolicy::Stop => TickDecision::Finish(EndReason::Boundary),
                BoundaryPolicy::Park => {
                    self.parked = true;
                    TickDecision::Suppress
                }
            };
        }
        self.ticks += 1;
        TickDecision::Emit(next)
    }

    /// Record that `value` was dispatched at `at`.
    pub fn commit(&mut self, value: u8, at: Timestamp) {
        self.current = Some(value);
        self.last_tick_at = Some(at);
    }

    pub fn finish(&mut self) {
        self.active = false;
    }
}
