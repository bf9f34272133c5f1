//! Type-state builder for `Machine`.
//!
//! The color sensor, real-time clock and belt motor are required at compile
//! time before `build()` is available. Gates, the operation timer, keypad,
//! display and store are checked by `try_build()` at runtime, because their
//! concrete types differ between host simulation and the target board.

use std::marker::PhantomData;

use sorter_traits::{
    ByteStore, Clock, ColorSensor, Display, HwTimer, Keypad, MonotonicClock, Motor, OutputPin,
    RealTimeClock,
};
use tracing::debug;

use crate::classifier::Classifier;
use crate::config::{ClassifierCfg, Gate, RoutingCfg, ServoCfg, TimingCfg};
use crate::counters::BinCounters;
use crate::error::{BuildError, Result};
use crate::irq::IrqLatch;
use crate::machine::Machine;
use crate::servo::{ServoOutput, ServoTiming};
use crate::state::OperatingState;

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

type GateParts = (Box<dyn OutputPin>, Box<dyn HwTimer>);

/// Everything the builder collects; moved whole between type states.
#[derive(Default)]
struct Parts {
    sensor: Option<Box<dyn ColorSensor>>,
    rtc: Option<Box<dyn RealTimeClock>>,
    motor: Option<Box<dyn Motor>>,
    gates: [Option<GateParts>; 2],
    op_timer: Option<Box<dyn HwTimer>>,
    keypad: Option<Box<dyn Keypad>>,
    display: Option<Box<dyn Display>>,
    store: Option<Box<dyn ByteStore>>,
    clock: Option<Box<dyn Clock>>,
    classifier: Option<ClassifierCfg>,
    servo: Option<ServoCfg>,
    timing: Option<TimingCfg>,
    routing: Option<RoutingCfg>,
}

/// Builder for `Machine`. Configuration is validated on build.
pub struct MachineBuilder<S, R, M> {
    parts: Parts,
    _s: PhantomData<S>,
    _r: PhantomData<R>,
    _m: PhantomData<M>,
}

impl Default for MachineBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            parts: Parts::default(),
            _s: PhantomData,
            _r: PhantomData,
            _m: PhantomData,
        }
    }
}

impl<S, R, M> MachineBuilder<S, R, M> {
    fn retype<S2, R2, M2>(self) -> MachineBuilder<S2, R2, M2> {
        MachineBuilder {
            parts: self.parts,
            _s: PhantomData,
            _r: PhantomData,
            _m: PhantomData,
        }
    }
}

impl Machine {
    /// Start building a Machine.
    pub fn builder() -> MachineBuilder<Missing, Missing, Missing> {
        MachineBuilder::default()
    }
}

fn validate(classifier: &ClassifierCfg, servo: &ServoCfg, timing: &TimingCfg) -> Result<()> {
    let invalid = |what| Err(eyre::Report::new(BuildError::InvalidConfig(what)));
    if classifier.high_band_clear <= classifier.ambient_clear {
        return invalid("high band threshold must exceed ambient");
    }
    if classifier.commit_debounce == 0 {
        return invalid("commit debounce must be at least one reading");
    }
    if !(classifier.ratio_low < classifier.top_ratio_high
        && classifier.ratio_low < classifier.bottom_ratio_high)
    {
        return invalid("low ratio must be below both high ratios");
    }
    if servo.tick_ns == 0 {
        return invalid("servo tick must be > 0");
    }
    if servo.pass_us == 0 || servo.divert_us == 0 {
        return invalid("servo pulse widths must be > 0");
    }
    if servo.period_us <= servo.pass_us.max(servo.divert_us) {
        return invalid("servo period must exceed both pulse widths");
    }
    if timing.tick.is_zero() {
        return invalid("tick period must be > 0");
    }
    if timing.operation_timeout.is_zero() {
        return invalid("operation timeout must be > 0");
    }
    Ok(())
}

impl<S, R, M> MachineBuilder<S, R, M> {
    /// Fallible build available in any type-state; returns a detailed error
    /// for missing pieces. Restores persisted counters and shows Standby.
    pub fn try_build(self) -> Result<Machine> {
        let missing = |what| eyre::Report::new(BuildError::MissingComponent(what));
        let p = self.parts;

        let sensor = p.sensor.ok_or_else(|| missing("color sensor"))?;
        let rtc = p.rtc.ok_or_else(|| missing("real-time clock"))?;
        let motor = p.motor.ok_or_else(|| missing("motor"))?;
        let [g0, g1] = p.gates;
        let (pin0, timer0) = g0.ok_or_else(|| missing("gate 0"))?;
        let (pin1, timer1) = g1.ok_or_else(|| missing("gate 1"))?;
        let op_timer = p.op_timer.ok_or_else(|| missing("operation timer"))?;
        let keypad = p.keypad.ok_or_else(|| missing("keypad"))?;
        let display = p.display.ok_or_else(|| missing("display"))?;
        let store = p.store.ok_or_else(|| missing("store"))?;

        let classifier = p.classifier.unwrap_or_default();
        let servo = p.servo.unwrap_or_default();
        let timing = p.timing.unwrap_or_default();
        validate(&classifier, &servo, &timing)?;

        let servo_timing = ServoTiming::from_cfg(&servo);
        debug!(?servo_timing, ?timing, "building machine");

        let mut machine = Machine {
            state: OperatingState::Standby,
            fault: None,
            sensor,
            rtc,
            motor,
            gates: [
                ServoOutput::new(servo_timing, pin0, timer0),
                ServoOutput::new(servo_timing, pin1, timer1),
            ],
            op_timer,
            keypad,
            display,
            store,
            clock: p.clock.unwrap_or_else(|| Box::new(MonotonicClock::new())),
            classifier: Classifier::new(classifier),
            routing: p.routing.unwrap_or_default(),
            timing,
            irq: IrqLatch::default(),
            counters: BinCounters::zero(),
            history: BinCounters::zero(),
            run_active: false,
            start_s: None,
            end_s: None,
            elapsed_s: 0,
            page: None,
            last_page_key: None,
            anim: 0,
        };
        machine.boot();
        Ok(machine)
    }
}

/// Chainable setters that do not affect type-state.
impl<S, R, M> MachineBuilder<S, R, M> {
    /// Servo output pin and its period timer for one gate.
    pub fn with_gate(
        mut self,
        gate: Gate,
        pin: impl OutputPin + 'static,
        timer: impl HwTimer + 'static,
    ) -> Self {
        self.parts.gates[gate.index()] = Some((Box::new(pin), Box::new(timer)));
        self
    }

    pub fn with_operation_timer(mut self, timer: impl HwTimer + 'static) -> Self {
        self.parts.op_timer = Some(Box::new(timer));
        self
    }

    pub fn with_keypad(mut self, keypad: impl Keypad + 'static) -> Self {
        self.parts.keypad = Some(Box::new(keypad));
        self
    }

    pub fn with_display(mut self, display: impl Display + 'static) -> Self {
        self.parts.display = Some(Box::new(display));
        self
    }

    pub fn with_store(mut self, store: impl ByteStore + 'static) -> Self {
        self.parts.store = Some(Box::new(store));
        self
    }

    /// Inject a custom clock (tests use a manual one). Defaults to monotonic time.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.parts.clock = Some(Box::new(clock));
        self
    }

    pub fn with_classifier_cfg(mut self, cfg: ClassifierCfg) -> Self {
        self.parts.classifier = Some(cfg);
        self
    }

    pub fn with_servo_cfg(mut self, cfg: ServoCfg) -> Self {
        self.parts.servo = Some(cfg);
        self
    }

    pub fn with_timing_cfg(mut self, cfg: TimingCfg) -> Self {
        self.parts.timing = Some(cfg);
        self
    }

    pub fn with_routing(mut self, routing: RoutingCfg) -> Self {
        self.parts.routing = Some(routing);
        self
    }

    /// Take every tunable from a loaded config file.
    pub fn with_config(self, cfg: &sorter_config::Config) -> Self {
        self.with_classifier_cfg(ClassifierCfg::from(cfg))
            .with_servo_cfg(ServoCfg::from(&cfg.servo))
            .with_timing_cfg(TimingCfg::from(&cfg.timing))
            .with_routing(RoutingCfg::from(&cfg.routing))
    }
}

// Setters that advance type-state
impl<R, M> MachineBuilder<Missing, R, M> {
    pub fn with_color_sensor(
        mut self,
        sensor: impl ColorSensor + 'static,
    ) -> MachineBuilder<Set, R, M> {
        self.parts.sensor = Some(Box::new(sensor));
        self.retype()
    }
}

impl<S, M> MachineBuilder<S, Missing, M> {
    pub fn with_rtc(mut self, rtc: impl RealTimeClock + 'static) -> MachineBuilder<S, Set, M> {
        self.parts.rtc = Some(Box::new(rtc));
        self.retype()
    }
}

impl<S, R> MachineBuilder<S, R, Missing> {
    pub fn with_motor(mut self, motor: impl Motor + 'static) -> MachineBuilder<S, R, Set> {
        self.parts.motor = Some(Box::new(motor));
        self.retype()
    }
}

impl MachineBuilder<Set, Set, Set> {
    /// Validate and build. Only available once sensor, clock and motor are set.
    pub fn build(self) -> Result<Machine> {
        self.try_build()
    }
}
