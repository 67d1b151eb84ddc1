//! Utility re-exports for the Sonar Rover.
//!
//! - `clock`: microsecond time source used to time echo pulses
//! - `config`: runtime tunables (`Tuning`) and their validation
//! - `controllers`: ultrasonic sensor, differential drive and the control cycle
//! - `math`: the pure behavior selector

pub mod clock;
pub mod config;
pub mod controllers;
pub mod math;

pub use clock::{ManualClock, MicrosClock};
pub use config::{ConfigError, Tuning};
pub use controllers::{CycleReport, RobotController};
pub use embassy_time::Duration;
pub use math::behavior::{BehaviorSelector, DistanceBand, DistanceSample, Maneuver, Rule};
