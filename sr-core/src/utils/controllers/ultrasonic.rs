//! HC-SR04 style ultrasonic ranging.
//!
//! A ranging cycle drives the trigger line low, pulses it high for at least 10 µs,
//! then times how long the echo line stays high. An echo still high from the
//! previous ping is waited out first so its tail is never timed. The whole wait is
//! bounded by the echo timeout; a pulse that never starts or never ends within it
//! yields `DistanceSample::NoEcho`.

use embedded_hal::{
    delay::DelayNs,
    digital::{Error as _, ErrorKind, InputPin, OutputPin},
};

use crate::utils::{clock::MicrosClock, config::Tuning, math::behavior::DistanceSample};

/// Pin I/O failures while ranging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    Trigger(ErrorKind),
    Echo(ErrorKind),
}

/// Trigger output and echo input of one sensor.
pub struct SensorPins<TRIG, ECHO> {
    pub trigger: TRIG,
    pub echo: ECHO,
}

/// Anything that produces one distance sample per call.
pub trait RangeSensor {
    /// Take one reading, blocking for at most the configured echo timeout.
    fn measure_distance_cm<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<DistanceSample, SensorError>;
}

/// Ultrasonic sensor driver that owns its pins and a microsecond clock.
pub struct UltrasonicSensor<TRIG, ECHO, C> {
    pins: SensorPins<TRIG, ECHO>,
    clock: C,
    settle_us: u32,
    pulse_us: u32,
    timeout_us: u64,
}

impl<TRIG, ECHO, C> UltrasonicSensor<TRIG, ECHO, C>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    C: MicrosClock,
{
    pub fn new(
        pins: SensorPins<TRIG, ECHO>,
        clock: C,
        tuning: &Tuning,
    ) -> Self {
        Self {
            pins,
            clock,
            settle_us: tuning.trigger_settle_us.max(Tuning::MIN_SETTLE_US),
            pulse_us: tuning.trigger_pulse_us.max(Tuning::MIN_PULSE_US),
            timeout_us: tuning.echo_timeout_us as u64,
        }
    }

    /// Give the pins and clock back.
    pub fn release(self) -> (SensorPins<TRIG, ECHO>, C) {
        (self.pins, self.clock)
    }

    fn trigger<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<(), SensorError> {
        let trig = |e: TRIG::Error| SensorError::Trigger(e.kind());
        self.pins.trigger.set_low().map_err(trig)?;
        delay.delay_us(self.settle_us);
        self.pins.trigger.set_high().map_err(trig)?;
        delay.delay_us(self.pulse_us);
        self.pins.trigger.set_low().map_err(trig)
    }

    /// Time the echo pulse. `None` when the timeout expires first.
    fn echo_width_us(&mut self) -> Result<Option<u64>, SensorError> {
        let echo = |e: ECHO::Error| SensorError::Echo(e.kind());
        let started = self.clock.now_us();

        // Tail of the previous ping.
        while self.pins.echo.is_high().map_err(echo)? {
            if self.clock.elapsed_since(started) >= self.timeout_us {
                return Ok(None);
            }
        }

        while self.pins.echo.is_low().map_err(echo)? {
            if self.clock.elapsed_since(started) >= self.timeout_us {
                return Ok(None);
            }
        }
        let rose = self.clock.now_us();

        while self.pins.echo.is_high().map_err(echo)? {
            if self.clock.elapsed_since(started) >= self.timeout_us {
                return Ok(None);
            }
        }
        Ok(Some(self.clock.elapsed_since(rose)))
    }
}

impl<TRIG, ECHO, C> RangeSensor for UltrasonicSensor<TRIG, ECHO, C>
where
    TRIG: OutputPin,
    ECHO: InputPin,
    C: MicrosClock,
{
    fn measure_distance_cm<D: DelayNs>(
        &mut self,
        delay: &mut D,
    ) -> Result<DistanceSample, SensorError> {
        self.trigger(delay)?;
        let sample = match self.echo_width_us()? {
            Some(width) => DistanceSample::from_echo_us(width),
            None => DistanceSample::NoEcho,
        };
        tracing::debug!(?sample, "ultrasonic reading");
        Ok(sample)
    }
}
