//! Microsecond time source for pulse timing.
//!
//! `embedded-hal` has no notion of "now", so the ultrasonic driver takes a
//! `MicrosClock` alongside its pins. Boards wrap their free-running timer;
//! host tests and the simulator use `ManualClock`.

use core::cell::Cell;

/// Monotonic microsecond counter.
pub trait MicrosClock {
    /// Current time in microseconds since an arbitrary epoch.
    fn now_us(&self) -> u64;

    /// Microseconds elapsed since `reference_us`, saturating at zero.
    fn elapsed_since(
        &self,
        reference_us: u64,
    ) -> u64 {
        self.now_us().saturating_sub(reference_us)
    }
}

impl<T: MicrosClock + ?Sized> MicrosClock for &T {
    fn now_us(&self) -> u64 {
        (**self).now_us()
    }
}

/// Clock whose time only moves when told to.
///
/// With a non-zero step, every `now_us` read advances the clock by that many
/// microseconds after returning, which models the cost of a polling loop.
#[derive(Debug, Default)]
pub struct ManualClock {
    current_us: Cell<u64>,
    step_us: u64,
}

impl ManualClock {
    pub const fn new() -> Self {
        Self {
            current_us: Cell::new(0),
            step_us: 0,
        }
    }

    /// Clock that advances by `step_us` on every read.
    pub const fn stepping(step_us: u64) -> Self {
        Self {
            current_us: Cell::new(0),
            step_us,
        }
    }

    pub fn set(
        &self,
        us: u64,
    ) {
        self.current_us.set(us);
    }

    pub fn advance(
        &self,
        us: u64,
    ) {
        self.current_us.set(self.current_us.get().saturating_add(us));
    }
}

impl MicrosClock for ManualClock {
    fn now_us(&self) -> u64 {
        let now = self.current_us.get();
        self.current_us.set(now.saturating_add(self.step_us));
        now
    }
}
