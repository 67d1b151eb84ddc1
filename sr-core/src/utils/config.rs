//! Runtime tunables for the Sonar Rover.
//!
//! Pin assignment is expressed by the types handed to the driver constructors;
//! everything numeric lives in `Tuning`. Defaults are the reference values
//! (20 cm threshold, 300 ms avoidance hold, 30 ms echo timeout).

use core::fmt;

use embassy_time::Duration;
use serde::{Deserialize, Serialize};

use crate::utils::{
    controllers::drive::MAX_SPEED,
    math::behavior::{BehaviorSelector, Maneuver},
};

/// Numeric configuration consumed by the sensor, selector and actuator.
///
/// Serialized as JSON; missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    /// Samples strictly below this distance select `AvoidObstacle`.
    pub obstacle_threshold_cm: u16,
    /// Time the avoidance turn is held before sensing again.
    pub avoid_hold_ms: u32,
    /// Upper bound on the whole echo wait.
    pub echo_timeout_us: u32,
    /// Trigger low time before the pulse.
    pub trigger_settle_us: u32,
    /// Trigger high time.
    pub trigger_pulse_us: u32,
    /// Speed applied to both wheels when moving forward.
    pub forward_speed: i16,
    /// Wheel speed magnitude during the in-place avoidance turn.
    pub turn_speed: i16,
    /// Maneuver selected when no echo arrived.
    pub no_echo: Maneuver,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            obstacle_threshold_cm: 20,
            avoid_hold_ms: 300,
            echo_timeout_us: 30_000,
            trigger_settle_us: 2,
            trigger_pulse_us: 10,
            forward_speed: 120,
            turn_speed: 100,
            no_echo: Maneuver::MoveForward,
        }
    }
}

/// Rejected configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// JSON did not parse into a `Tuning`.
    Malformed,
    /// A speed magnitude exceeds the maximum duty value.
    SpeedOutOfRange { field: &'static str, value: i16 },
    /// Trigger timings shorter than the sensor accepts.
    TriggerTooShort { field: &'static str, value: u32, min: u32 },
    EchoTimeoutZero,
}

impl fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ConfigError::Malformed => write!(f, "tuning is not valid JSON"),
            ConfigError::SpeedOutOfRange { field, value } => {
                write!(f, "{field} = {value} is outside -{MAX_SPEED}..={MAX_SPEED}")
            }
            ConfigError::TriggerTooShort { field, value, min } => {
                write!(f, "{field} = {value} us is below the {min} us minimum")
            }
            ConfigError::EchoTimeoutZero => write!(f, "echo_timeout_us must be non-zero"),
        }
    }
}

impl Tuning {
    pub const MIN_SETTLE_US: u32 = 2;
    pub const MIN_PULSE_US: u32 = 10;

    /// Parse and validate a JSON tuning document.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        let tuning: Tuning = serde_json::from_slice(bytes).map_err(|e| {
            tracing::warn!("tuning rejected: {:?}", e);
            ConfigError::Malformed
        })?;
        tuning.validate()
    }

    /// Check every field against the hardware limits.
    pub fn validate(self) -> Result<Self, ConfigError> {
        for (field, value) in [
            ("forward_speed", self.forward_speed),
            ("turn_speed", self.turn_speed),
        ] {
            if value.unsigned_abs() > MAX_SPEED as u16 {
                return Err(ConfigError::SpeedOutOfRange { field, value });
            }
        }
        if self.trigger_settle_us < Self::MIN_SETTLE_US {
            return Err(ConfigError::TriggerTooShort {
                field: "trigger_settle_us",
                value: self.trigger_settle_us,
                min: Self::MIN_SETTLE_US,
            });
        }
        if self.trigger_pulse_us < Self::MIN_PULSE_US {
            return Err(ConfigError::TriggerTooShort {
                field: "trigger_pulse_us",
                value: self.trigger_pulse_us,
                min: Self::MIN_PULSE_US,
            });
        }
        if self.echo_timeout_us == 0 {
            return Err(ConfigError::EchoTimeoutZero);
        }
        Ok(self)
    }

    pub fn avoid_hold(&self) -> Duration {
        Duration::from_millis(self.avoid_hold_ms as u64)
    }

    pub fn echo_timeout(&self) -> Duration {
        Duration::from_micros(self.echo_timeout_us as u64)
    }

    /// Worst-case time one cycle occupies the calling thread: the full trigger
    /// sequence, a timed-out echo wait and an avoidance hold.
    pub fn cycle_budget(&self) -> Duration {
        Duration::from_micros(
            self.trigger_settle_us as u64
                + self.trigger_pulse_us as u64
                + self.echo_timeout_us as u64,
        ) + self.avoid_hold()
    }

    /// Single-threshold selector for these tunables.
    pub fn selector(&self) -> BehaviorSelector {
        BehaviorSelector::threshold(self.obstacle_threshold_cm, self.no_echo)
    }
}
