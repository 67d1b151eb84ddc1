//! Differential drive for two DC motors behind an L298N style H-bridge.
//!
//! Each channel has one PWM line for the duty cycle and two direction lines:
//!
//! | speed | IN1  | IN2  | PWM duty          |
//! |-------|------|------|-------------------|
//! | >= 0  | high | low  | `speed / 255`     |
//! | < 0   | low  | high | `-speed / 255`    |
//!
//! The channels are driven open loop; nothing reads back wheel speed.

use embassy_time::Duration;
use embedded_hal::{
    delay::DelayNs,
    digital::{self, Error as _, OutputPin},
    pwm::{self, Error as _, SetDutyCycle},
};

use crate::utils::{config::Tuning, math::behavior::Maneuver};

/// Largest speed magnitude, equal to the 8-bit duty-cycle ceiling.
pub const MAX_SPEED: i16 = 255;

/// Signed wheel speed, always within `-MAX_SPEED..=MAX_SPEED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Speed(i16);

impl Speed {
    pub const STOP: Speed = Speed(0);

    /// Clamp `value` into range.
    pub const fn new(value: i32) -> Self {
        let clamped = if value > MAX_SPEED as i32 {
            MAX_SPEED
        } else if value < -(MAX_SPEED as i32) {
            -MAX_SPEED
        } else {
            value as i16
        };
        Speed(clamped)
    }

    pub const fn get(self) -> i16 {
        self.0
    }

    pub const fn is_reverse(self) -> bool {
        self.0 < 0
    }

    /// Duty value in `0..=255`.
    pub const fn duty(self) -> u8 {
        self.0.unsigned_abs() as u8
    }
}

/// Left and right wheel speeds for one actuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotorCommand {
    pub left: Speed,
    pub right: Speed,
}

impl MotorCommand {
    pub const STOP: MotorCommand = MotorCommand {
        left: Speed::STOP,
        right: Speed::STOP,
    };

    pub const fn new(
        left: i32,
        right: i32,
    ) -> Self {
        Self {
            left: Speed::new(left),
            right: Speed::new(right),
        }
    }
}

/// What the actuator does for one maneuver: a command, then an optional hold.
///
/// A hold occupies the calling thread for its full duration and is not
/// re-evaluated while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actuation {
    pub command: MotorCommand,
    pub hold: Option<Duration>,
}

/// Maneuver to actuation mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrivePolicy {
    pub forward: MotorCommand,
    pub avoid: MotorCommand,
    pub avoid_hold: Duration,
}

impl Default for DrivePolicy {
    fn default() -> Self {
        Self::from(&Tuning::default())
    }
}

impl From<&Tuning> for DrivePolicy {
    fn from(tuning: &Tuning) -> Self {
        let fwd = tuning.forward_speed as i32;
        let turn = tuning.turn_speed as i32;
        Self {
            forward: MotorCommand::new(fwd, fwd),
            // Spin in place: left wheel back, right wheel forward.
            avoid: MotorCommand::new(-turn, turn),
            avoid_hold: tuning.avoid_hold(),
        }
    }
}

impl DrivePolicy {
    pub fn plan(
        &self,
        maneuver: Maneuver,
    ) -> Actuation {
        match maneuver {
            Maneuver::MoveForward => Actuation {
                command: self.forward,
                hold: None,
            },
            Maneuver::AvoidObstacle => Actuation {
                command: self.avoid,
                hold: Some(self.avoid_hold),
            },
        }
    }
}

/// Pin-level failure on one motor channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorFault {
    Direction(digital::ErrorKind),
    Pwm(pwm::ErrorKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveError {
    Left(MotorFault),
    Right(MotorFault),
}

/// A single open-loop motor.
pub trait Motor {
    fn drive(
        &mut self,
        speed: Speed,
    ) -> Result<(), MotorFault>;
}

/// PWM line plus two direction lines of one H-bridge channel.
pub struct MotorChannel<PWM, IN1, IN2> {
    pub pwm: PWM,
    pub in1: IN1,
    pub in2: IN2,
}

impl<PWM, IN1, IN2> MotorChannel<PWM, IN1, IN2> {
    pub fn new(
        pwm: PWM,
        in1: IN1,
        in2: IN2,
    ) -> Self {
        Self { pwm, in1, in2 }
    }
}

impl<PWM, IN1, IN2> Motor for MotorChannel<PWM, IN1, IN2>
where
    PWM: SetDutyCycle,
    IN1: OutputPin,
    IN2: OutputPin,
{
    fn drive(
        &mut self,
        speed: Speed,
    ) -> Result<(), MotorFault> {
        let (in1, in2) = if speed.is_reverse() {
            (self.in1.set_low(), self.in2.set_high())
        } else {
            (self.in1.set_high(), self.in2.set_low())
        };
        in1.map_err(|e| MotorFault::Direction(e.kind()))?;
        in2.map_err(|e| MotorFault::Direction(e.kind()))?;
        self.pwm
            .set_duty_cycle_fraction(speed.duty() as u16, MAX_SPEED as u16)
            .map_err(|e| MotorFault::Pwm(e.kind()))
    }
}

/// Two independent motor channels plus the maneuver mapping.
pub struct DifferentialDrive<L, R> {
    left: L,
    right: R,
    policy: DrivePolicy,
    last: Option<MotorCommand>,
}

impl<L, R> DifferentialDrive<L, R>
where
    L: Motor,
    R: Motor,
{
    pub fn new(
        left: L,
        right: R,
        policy: DrivePolicy,
    ) -> Self {
        Self {
            left,
            right,
            policy,
            last: None,
        }
    }

    /// Set both channels' direction and duty.
    pub fn apply_move(
        &mut self,
        command: MotorCommand,
    ) -> Result<(), DriveError> {
        self.left.drive(command.left).map_err(DriveError::Left)?;
        self.right.drive(command.right).map_err(DriveError::Right)?;
        if self.last != Some(command) {
            tracing::debug!(
                left = command.left.get(),
                right = command.right.get(),
                "motor command"
            );
        }
        self.last = Some(command);
        Ok(())
    }

    /// Apply the maneuver's command, then block for its hold if it has one.
    pub fn execute_maneuver<D: DelayNs>(
        &mut self,
        maneuver: Maneuver,
        delay: &mut D,
    ) -> Result<Actuation, DriveError> {
        let actuation = self.policy.plan(maneuver);
        self.apply_move(actuation.command)?;
        if let Some(hold) = actuation.hold {
            delay.delay_ms(u32::try_from(hold.as_millis()).unwrap_or(u32::MAX));
        }
        Ok(actuation)
    }

    pub fn stop(&mut self) -> Result<(), DriveError> {
        self.apply_move(MotorCommand::STOP)
    }

    pub fn policy(&self) -> &DrivePolicy {
        &self.policy
    }

    /// Last command successfully written to both channels.
    pub fn last_command(&self) -> Option<MotorCommand> {
        self.last
    }

    pub fn release(self) -> (L, R) {
        (self.left, self.right)
    }
}
