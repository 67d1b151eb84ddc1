//! Module Exports
//!
//! This file exports the peripheral drivers and the control cycle that ties them
//! together.
//!
//! - `ultrasonic`: trigger/echo ranging sensor.
//! - `drive`: two-channel differential drive and the maneuver mapping.

pub mod drive;
pub mod ultrasonic;

use embedded_hal::delay::DelayNs;

pub use drive::{
    Actuation, DifferentialDrive, DriveError, DrivePolicy, Motor, MotorChannel, MotorCommand,
    MotorFault, Speed,
};
pub use ultrasonic::{RangeSensor, SensorError, SensorPins, UltrasonicSensor};

use crate::utils::{
    config::Tuning,
    math::behavior::{BehaviorSelector, DistanceSample, Maneuver},
};

/// Everything that happened in one sense, decide, act cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub sample: DistanceSample,
    pub maneuver: Maneuver,
    /// Command attempted for the maneuver. `hold` is `None` when a drive fault skipped it.
    pub actuation: Actuation,
    pub sensor_fault: Option<SensorError>,
    pub drive_fault: Option<DriveError>,
}

/// Owns the sensor, the drive and the delay provider for the process lifetime.
pub struct RobotController<S, L, R, D, const N: usize = 2> {
    sensor: S,
    drive: DifferentialDrive<L, R>,
    selector: BehaviorSelector<N>,
    delay: D,
    last_maneuver: Option<Maneuver>,
}

impl<S, L, R, D, const N: usize> RobotController<S, L, R, D, N>
where
    S: RangeSensor,
    L: Motor,
    R: Motor,
    D: DelayNs,
{
    pub fn new(
        sensor: S,
        drive: DifferentialDrive<L, R>,
        selector: BehaviorSelector<N>,
        delay: D,
    ) -> Self {
        RobotController {
            sensor,
            drive,
            selector,
            delay,
            last_maneuver: None,
        }
    }

    /// Run one cycle to completion.
    ///
    /// Faults are logged and absorbed: a sensor fault reads as `NoEcho` for this
    /// cycle, a drive fault skips the hold. Neither stops the loop.
    pub fn step(&mut self) -> CycleReport {
        let (sample, sensor_fault) = match self.sensor.measure_distance_cm(&mut self.delay) {
            Ok(sample) => (sample, None),
            Err(e) => {
                tracing::warn!("Distance sensor fault: {:?}", e);
                (DistanceSample::NoEcho, Some(e))
            }
        };

        let maneuver = self.selector.select(sample);
        if self.last_maneuver != Some(maneuver) {
            tracing::info!(?sample, ?maneuver, "maneuver changed");
            self.last_maneuver = Some(maneuver);
        }

        let (actuation, drive_fault) = match self.drive.execute_maneuver(maneuver, &mut self.delay) {
            Ok(actuation) => (actuation, None),
            Err(e) => {
                tracing::error!("Drive fault during {:?}: {:?}", maneuver, e);
                let planned = self.drive.policy().plan(maneuver);
                (
                    Actuation {
                        hold: None,
                        ..planned
                    },
                    Some(e),
                )
            }
        };

        CycleReport {
            sample,
            maneuver,
            actuation,
            sensor_fault,
            drive_fault,
        }
    }

    /// Cycle forever.
    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }

    pub fn drive(&self) -> &DifferentialDrive<L, R> {
        &self.drive
    }

    pub fn selector(&self) -> &BehaviorSelector<N> {
        &self.selector
    }

    /// Stop both motors. Used when the host shuts the loop down.
    pub fn halt(&mut self) -> Result<(), DriveError> {
        tracing::info!("Halting drive");
        self.drive.stop()
    }

    pub fn release(self) -> (S, DifferentialDrive<L, R>, D) {
        (self.sensor, self.drive, self.delay)
    }
}

impl<S, L, R, D> RobotController<S, L, R, D>
where
    S: RangeSensor,
    L: Motor,
    R: Motor,
    D: DelayNs,
{
    /// Build the reference single-threshold robot from its parts and tunables.
    pub fn with_tuning(
        sensor: S,
        left: L,
        right: R,
        delay: D,
        tuning: &Tuning,
    ) -> Self {
        tracing::info!(
            threshold_cm = tuning.obstacle_threshold_cm,
            hold_ms = tuning.avoid_hold_ms,
            "Sonar Rover controller ready"
        );
        Self::new(
            sensor,
            DifferentialDrive::new(left, right, DrivePolicy::from(tuning)),
            tuning.selector(),
            delay,
        )
    }
}
