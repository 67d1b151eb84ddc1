//! Simulated rover board.
//!
//! Everything runs on virtual time: delays and echo polls advance the board clock,
//! and the wheels integrate their motion over whatever time passes. The robot
//! faces one obstacle at a time; turning in place by a quarter turn or more brings
//! the next distance from the obstacle list into view.

use std::{
    cell::{Cell, RefCell},
    convert::Infallible,
    rc::Rc,
};

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType as DigitalErrorType, InputPin, OutputPin},
    pwm::{ErrorType as PwmErrorType, SetDutyCycle},
};
use serde::Serialize;
use sr_core::utils::{
    controllers::{MotorChannel, SensorPins, UltrasonicSensor},
    MicrosClock, RobotController, Tuning,
};

/// Wheel surface speed at full duty.
const MAX_WHEEL_CM_S: f32 = 60.0;
/// Distance between the wheel contact points.
const WHEEL_BASE_CM: f32 = 15.0;
/// Beyond this the transducer hears nothing back.
const MAX_RANGE_CM: f32 = 400.0;
/// Time between the trigger falling and the echo rising (ultrasonic burst).
const BURST_US: u64 = 450;
/// Each echo poll costs this much time.
const POLL_US: u64 = 1;
const PWM_MAX: u16 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Default, Clone, Copy)]
struct Wheel {
    duty: u16,
    in1: bool,
    in2: bool,
}

impl Wheel {
    /// Signed fraction of full speed; a bridge with both inputs equal is braked.
    fn speed(&self) -> f32 {
        let magnitude = self.duty as f32 / PWM_MAX as f32;
        match (self.in1, self.in2) {
            (true, false) => magnitude,
            (false, true) => -magnitude,
            _ => 0.0,
        }
    }
}

/// Odometry of the simulated run.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct Odometry {
    pub travelled_cm: f32,
    pub turned_deg: f32,
    pub obstacles_passed: u32,
    pub collisions: u32,
    pub closest_cm: Option<f32>,
}

/// Shared state of the simulated world.
pub struct Board {
    now_us: Cell<u64>,
    range_cm: Cell<f32>,
    obstacles: Vec<u16>,
    next_obstacle: Cell<usize>,
    turn_progress_deg: Cell<f32>,
    echo_window: Cell<Option<(u64, u64)>>,
    wheels: RefCell<[Wheel; 2]>,
    odometry: RefCell<Odometry>,
}

impl Board {
    /// Start facing the first entry of `obstacles`.
    pub fn new(obstacles: Vec<u16>) -> Rc<Self> {
        let obstacles = if obstacles.is_empty() {
            vec![MAX_RANGE_CM as u16 + 100]
        } else {
            obstacles
        };
        Rc::new(Self {
            now_us: Cell::new(0),
            range_cm: Cell::new(obstacles[0] as f32),
            next_obstacle: Cell::new(1 % obstacles.len()),
            obstacles,
            turn_progress_deg: Cell::new(0.0),
            echo_window: Cell::new(None),
            wheels: RefCell::new([Wheel::default(); 2]),
            odometry: RefCell::new(Odometry::default()),
        })
    }

    pub fn range_cm(&self) -> f32 {
        self.range_cm.get()
    }

    pub fn odometry(&self) -> Odometry {
        *self.odometry.borrow()
    }

    /// Let `us` microseconds of virtual time pass.
    pub fn advance(
        &self,
        us: u64,
    ) {
        if us == 0 {
            return;
        }
        self.now_us.set(self.now_us.get() + us);

        let dt = us as f32 / 1_000_000.0;
        let [left, right] = *self.wheels.borrow();
        let vl = left.speed() * MAX_WHEEL_CM_S;
        let vr = right.speed() * MAX_WHEEL_CM_S;
        if vl == 0.0 && vr == 0.0 {
            return;
        }

        let forward_cm = (vl + vr) / 2.0 * dt;
        let yaw_deg = ((vr - vl) / WHEEL_BASE_CM * dt).to_degrees();

        let mut odo = self.odometry.borrow_mut();
        odo.travelled_cm += forward_cm.abs();
        odo.turned_deg += yaw_deg.abs();

        let mut range = self.range_cm.get() - forward_cm;
        if range <= 0.0 {
            if self.range_cm.get() > 0.0 {
                odo.collisions += 1;
                tracing::warn!("simulated robot hit the obstacle");
            }
            range = 0.0;
        }

        let progress = self.turn_progress_deg.get() + yaw_deg.abs();
        if progress >= 90.0 {
            let idx = self.next_obstacle.get();
            range = self.obstacles[idx] as f32;
            self.next_obstacle.set((idx + 1) % self.obstacles.len());
            self.turn_progress_deg.set(0.0);
            odo.obstacles_passed += 1;
            tracing::debug!(range_cm = range, "turned away, new obstacle in view");
        } else {
            self.turn_progress_deg.set(progress);
        }

        odo.closest_cm = Some(odo.closest_cm.map_or(range, |c| c.min(range)));
        self.range_cm.set(range);
    }

    fn fire(&self) {
        let range = self.range_cm.get();
        let window = (range <= MAX_RANGE_CM).then(|| {
            let rise = self.now_us.get() + BURST_US;
            let width = (range / 0.017).round() as u64;
            (rise, rise + width)
        });
        self.echo_window.set(window);
    }

    fn echo_high(&self) -> bool {
        self.advance(POLL_US);
        let now = self.now_us.get();
        matches!(self.echo_window.get(), Some((rise, fall)) if rise <= now && now < fall)
    }

    fn wheel(
        &self,
        side: Side,
        update: impl FnOnce(&mut Wheel),
    ) {
        let mut wheels = self.wheels.borrow_mut();
        let idx = match side {
            Side::Left => 0,
            Side::Right => 1,
        };
        update(&mut wheels[idx]);
    }
}

/// Board timer.
pub struct SimClock(pub Rc<Board>);

impl MicrosClock for SimClock {
    fn now_us(&self) -> u64 {
        self.0.now_us.get()
    }
}

/// Blocking delay that advances virtual time instead of sleeping.
pub struct SimDelay(pub Rc<Board>);

impl DelayNs for SimDelay {
    fn delay_ns(
        &mut self,
        ns: u32,
    ) {
        self.0.advance((ns as u64).div_ceil(1_000));
    }

    fn delay_us(
        &mut self,
        us: u32,
    ) {
        self.0.advance(us as u64);
    }

    fn delay_ms(
        &mut self,
        ms: u32,
    ) {
        self.0.advance(ms as u64 * 1_000);
    }
}

pub struct SimTrigger {
    board: Rc<Board>,
    high: bool,
}

impl SimTrigger {
    pub fn new(board: Rc<Board>) -> Self {
        Self { board, high: false }
    }
}

impl DigitalErrorType for SimTrigger {
    type Error = Infallible;
}

impl OutputPin for SimTrigger {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        if self.high {
            self.board.fire();
        }
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}

pub struct SimEcho(pub Rc<Board>);

impl DigitalErrorType for SimEcho {
    type Error = Infallible;
}

impl InputPin for SimEcho {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.echo_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.echo_high())
    }
}

/// 8-bit PWM output feeding one wheel.
pub struct SimPwm {
    board: Rc<Board>,
    side: Side,
}

impl SimPwm {
    pub fn new(
        board: Rc<Board>,
        side: Side,
    ) -> Self {
        Self { board, side }
    }
}

impl PwmErrorType for SimPwm {
    type Error = Infallible;
}

impl SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        PWM_MAX
    }

    fn set_duty_cycle(
        &mut self,
        duty: u16,
    ) -> Result<(), Self::Error> {
        self.board.wheel(self.side, |w| w.duty = duty.min(PWM_MAX));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeInput {
    In1,
    In2,
}

/// One H-bridge direction input.
pub struct SimDirPin {
    board: Rc<Board>,
    side: Side,
    input: BridgeInput,
}

impl SimDirPin {
    pub fn new(
        board: Rc<Board>,
        side: Side,
        input: BridgeInput,
    ) -> Self {
        Self { board, side, input }
    }

    fn set(
        &mut self,
        level: bool,
    ) {
        let input = self.input;
        self.board.wheel(self.side, |w| match input {
            BridgeInput::In1 => w.in1 = level,
            BridgeInput::In2 => w.in2 = level,
        });
    }
}

impl DigitalErrorType for SimDirPin {
    type Error = Infallible;
}

impl OutputPin for SimDirPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

pub type SimChannel = MotorChannel<SimPwm, SimDirPin, SimDirPin>;
pub type SimRover =
    RobotController<UltrasonicSensor<SimTrigger, SimEcho, SimClock>, SimChannel, SimChannel, SimDelay>;

fn channel(
    board: &Rc<Board>,
    side: Side,
) -> SimChannel {
    MotorChannel::new(
        SimPwm::new(board.clone(), side),
        SimDirPin::new(board.clone(), side, BridgeInput::In1),
        SimDirPin::new(board.clone(), side, BridgeInput::In2),
    )
}

/// Wire a controller to every peripheral of `board`.
pub fn rover(
    board: &Rc<Board>,
    tuning: &Tuning,
) -> SimRover {
    let pins = SensorPins {
        trigger: SimTrigger::new(board.clone()),
        echo: SimEcho(board.clone()),
    };
    let sensor = UltrasonicSensor::new(pins, SimClock(board.clone()), tuning);
    RobotController::with_tuning(
        sensor,
        channel(board, Side::Left),
        channel(board, Side::Right),
        SimDelay(board.clone()),
        tuning,
    )
}
