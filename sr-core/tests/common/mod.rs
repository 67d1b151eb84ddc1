//! Hand-written peripheral fakes shared by the integration tests.
#![allow(dead_code)]

use core::{
    cell::{Cell, RefCell},
    convert::Infallible,
};
use std::collections::VecDeque;

use embedded_hal::{
    delay::DelayNs,
    digital::{self, ErrorType as DigitalErrorType, InputPin, OutputPin},
    pwm::{ErrorType as PwmErrorType, SetDutyCycle},
};
use sr_core::utils::{ManualClock, MicrosClock};

/// One call made on `RecordingDelay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayCall {
    Ns(u32),
    Us(u32),
    Ms(u32),
}

/// Delay that returns immediately and remembers what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    pub calls: Vec<DelayCall>,
}

impl RecordingDelay {
    pub fn ms_calls(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DelayCall::Ms(ms) => Some(*ms),
                _ => None,
            })
            .collect()
    }

    pub fn us_calls(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DelayCall::Us(us) => Some(*us),
                _ => None,
            })
            .collect()
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(
        &mut self,
        ns: u32,
    ) {
        self.calls.push(DelayCall::Ns(ns));
    }

    fn delay_us(
        &mut self,
        us: u32,
    ) {
        self.calls.push(DelayCall::Us(us));
    }

    fn delay_ms(
        &mut self,
        ms: u32,
    ) {
        self.calls.push(DelayCall::Ms(ms));
    }
}

/// PWM output that stores every duty value written.
#[derive(Debug)]
pub struct RecordingPwm {
    pub max: u16,
    pub writes: Vec<u16>,
}

impl RecordingPwm {
    pub fn new(max: u16) -> Self {
        Self {
            max,
            writes: Vec::new(),
        }
    }

    pub fn duty(&self) -> Option<u16> {
        self.writes.last().copied()
    }
}

impl PwmErrorType for RecordingPwm {
    type Error = Infallible;
}

impl SetDutyCycle for RecordingPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(
        &mut self,
        duty: u16,
    ) -> Result<(), Self::Error> {
        self.writes.push(duty);
        Ok(())
    }
}

/// Output pin that stores its level.
#[derive(Debug, Default)]
pub struct LevelPin {
    pub high: Option<bool>,
    pub writes: usize,
}

impl DigitalErrorType for LevelPin {
    type Error = Infallible;
}

impl OutputPin for LevelPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = Some(false);
        self.writes += 1;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = Some(true);
        self.writes += 1;
        Ok(())
    }
}

/// Output pin that always fails.
#[derive(Debug, Default)]
pub struct BrokenPin;

impl DigitalErrorType for BrokenPin {
    type Error = digital::ErrorKind;
}

impl OutputPin for BrokenPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Err(digital::ErrorKind::Other)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Err(digital::ErrorKind::Other)
    }
}

impl InputPin for BrokenPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Err(digital::ErrorKind::Other)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Err(digital::ErrorKind::Other)
    }
}

/// Signed speed a channel was left at, read back from its pins.
pub fn signed_duty(
    pwm: &RecordingPwm,
    in1: &LevelPin,
    in2: &LevelPin,
) -> i32 {
    let duty = pwm.duty().expect("pwm never written") as i32;
    match (in1.high, in2.high) {
        (Some(true), Some(false)) => duty,
        (Some(false), Some(true)) => -duty,
        other => panic!("invalid direction pin state {:?}", other),
    }
}

/// Echo pulses produced in answer to trigger pulses, timed on a shared clock.
///
/// Each falling trigger edge consumes one scripted width. `None` means no echo.
/// The line may also start out high until `tail_until_us`, left over from an earlier
/// ping; a new burst only goes out once that tail has ended.
pub struct EchoScript<'a> {
    pub clock: &'a ManualClock,
    tail_until_us: u64,
    widths: RefCell<VecDeque<Option<u64>>>,
    window: Cell<Option<(u64, u64)>>,
    pub triggers: Cell<usize>,
}

/// Time between the trigger falling and the echo rising.
pub const ECHO_LATENCY_US: u64 = 50;

impl<'a> EchoScript<'a> {
    pub fn new(
        clock: &'a ManualClock,
        widths: &[Option<u64>],
    ) -> Self {
        Self::with_tail(clock, 0, widths)
    }

    /// Echo line held high until `tail_until_us` before any scripted pulse.
    pub fn with_tail(
        clock: &'a ManualClock,
        tail_until_us: u64,
        widths: &[Option<u64>],
    ) -> Self {
        Self {
            clock,
            tail_until_us,
            widths: RefCell::new(widths.iter().copied().collect()),
            window: Cell::new(None),
            triggers: Cell::new(0),
        }
    }

    fn arm(&self) {
        self.triggers.set(self.triggers.get() + 1);
        let next = self.widths.borrow_mut().pop_front().flatten();
        let rise = self.clock.now_us().max(self.tail_until_us) + ECHO_LATENCY_US;
        self.window.set(next.map(|w| (rise, rise.saturating_add(w))));
    }

    fn echo_high(&self) -> bool {
        // Every poll costs a microsecond.
        self.clock.advance(1);
        let now = self.clock.now_us();
        now < self.tail_until_us
            || matches!(self.window.get(), Some((rise, fall)) if rise <= now && now < fall)
    }
}

pub struct ScriptedTrigger<'s, 'a> {
    script: &'s EchoScript<'a>,
    high: bool,
}

impl<'s, 'a> ScriptedTrigger<'s, 'a> {
    pub fn new(script: &'s EchoScript<'a>) -> Self {
        Self {
            script,
            high: false,
        }
    }
}

impl DigitalErrorType for ScriptedTrigger<'_, '_> {
    type Error = Infallible;
}

impl OutputPin for ScriptedTrigger<'_, '_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.high {
            self.script.arm();
        }
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}

pub struct ScriptedEcho<'s, 'a> {
    script: &'s EchoScript<'a>,
}

impl<'s, 'a> ScriptedEcho<'s, 'a> {
    pub fn new(script: &'s EchoScript<'a>) -> Self {
        Self { script }
    }
}

impl DigitalErrorType for ScriptedEcho<'_, '_> {
    type Error = Infallible;
}

impl InputPin for ScriptedEcho<'_, '_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.script.echo_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.script.echo_high())
    }
}

/// Smallest echo width that reads back as `cm`.
pub fn echo_us_for(cm: u64) -> u64 {
    (cm * 1000).div_ceil(17)
}
