//! Software PWM for the gate servos.
//!
//! Each gate is a two-state machine (output level, divert selector) advanced
//! by its timer's overflow interrupt. Every overflow toggles the level and
//! returns the timer reload for the new level: the high width on a rising
//! edge (divert or pass width, chosen by the selector at that edge), and the
//! rest of the period on a falling edge. The selector may be written at any
//! time and takes effect on the next rising edge.
use std::time::Duration;

use sorter_traits::{HwTimer, OutputPin};

use crate::config::ServoCfg;

/// Pulse widths converted to timer counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoTiming {
    pub period: u32,
    pub pass_high: u32,
    pub divert_high: u32,
    pub tick_ns: u32,
}

impl ServoTiming {
    pub fn from_cfg(cfg: &ServoCfg) -> Self {
        let tick_ns = cfg.tick_ns.max(1);
        let counts = |us: u32| -> u32 {
            let c = (u64::from(us) * 1_000 + u64::from(tick_ns) / 2) / u64::from(tick_ns);
            u32::try_from(c).unwrap_or(u32::MAX).max(1)
        };
        let period = counts(cfg.period_us);
        Self {
            period,
            pass_high: counts(cfg.pass_us).min(period - 1),
            divert_high: counts(cfg.divert_us).min(period - 1),
            tick_ns,
        }
    }

    pub fn high_counts(&self, divert: bool) -> u32 {
        if divert {
            self.divert_high
        } else {
            self.pass_high
        }
    }

    /// Duration of `counts` timer ticks.
    pub fn to_duration(&self, counts: u32) -> Duration {
        Duration::from_nanos(u64::from(counts) * u64::from(self.tick_ns))
    }
}

/// Level and selector of one gate's pulse train.
#[derive(Debug, Clone)]
pub struct ServoPwm {
    timing: ServoTiming,
    level: bool,
    divert: bool,
    /// High width of the cycle in progress; sets the matching low width.
    cycle_high: u32,
}

impl ServoPwm {
    pub fn new(timing: ServoTiming) -> Self {
        Self {
            timing,
            level: false,
            divert: false,
            cycle_high: timing.pass_high,
        }
    }

    pub fn timing(&self) -> &ServoTiming {
        &self.timing
    }

    pub fn level(&self) -> bool {
        self.level
    }

    pub fn divert(&self) -> bool {
        self.divert
    }

    /// Written by the classifier; read on the next rising edge.
    pub fn set_divert(&mut self, divert: bool) {
        self.divert = divert;
    }

    /// Toggle the level and return the reload (in counts) for the new level.
    pub fn on_overflow(&mut self) -> u32 {
        self.level = !self.level;
        if self.level {
            self.cycle_high = self.timing.high_counts(self.divert);
            self.cycle_high
        } else {
            self.timing.period - self.cycle_high
        }
    }

    /// Back to the idle low level.
    pub fn idle(&mut self) {
        self.level = false;
    }
}

/// A gate servo: its pulse-train state, output pin and timer.
pub struct ServoOutput {
    pwm: ServoPwm,
    pin: Box<dyn OutputPin>,
    timer: Box<dyn HwTimer>,
}

impl ServoOutput {
    pub fn new(timing: ServoTiming, mut pin: Box<dyn OutputPin>, timer: Box<dyn HwTimer>) -> Self {
        pin.set_low();
        Self {
            pwm: ServoPwm::new(timing),
            pin,
            timer,
        }
    }

    pub fn pwm(&self) -> &ServoPwm {
        &self.pwm
    }

    pub fn set_divert(&mut self, divert: bool) {
        self.pwm.set_divert(divert);
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_enabled()
    }

    /// Start the pulse train from a low level; the first overflow raises the pin.
    pub fn enable(&mut self) {
        self.pwm.idle();
        self.pin.set_low();
        let t = *self.pwm.timing();
        self.timer
            .reload(t.to_duration(t.period - t.high_counts(self.pwm.divert())));
        self.timer.enable();
    }

    pub fn disable(&mut self) {
        self.timer.disable();
        self.pwm.idle();
        self.pin.set_low();
    }

    /// Timer overflow branch: toggle the pin and reschedule.
    pub fn on_timer(&mut self) {
        if !self.timer.is_enabled() {
            // overflow latched just before the timer was stopped
            return;
        }
        let counts = self.pwm.on_overflow();
        if self.pwm.level() {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        self.timer.reload(self.pwm.timing().to_duration(counts));
    }
}
