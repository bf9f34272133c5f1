//! Runtime configuration of the core, converted from `sorter_config` sections
//! (see `conversions`). Defaults match the shipped config file.
use std::time::Duration;

use crate::classifier::Category;

#[derive(Debug, Clone)]
pub struct ClassifierCfg {
    pub ambient_clear: u16,
    pub high_band_clear: u16,
    pub no_cap_clear: u16,
    pub top_ratio_high: f32,
    pub bottom_ratio_high: f32,
    pub ratio_low: f32,
    pub red_noise_floor: u16,
    /// Consecutive readings at or below ambient that close a pass.
    pub commit_debounce: u8,
    /// Legacy behavior: a rising edge during the closing debounce commits the
    /// open pass and starts a new one.
    pub allow_reentry: bool,
}

impl Default for ClassifierCfg {
    fn default() -> Self {
        Self {
            ambient_clear: 22,
            high_band_clear: 30,
            no_cap_clear: 300,
            top_ratio_high: 2.0,
            bottom_ratio_high: 3.2,
            ratio_low: 0.75,
            red_noise_floor: 5,
            commit_debounce: 3,
            allow_reentry: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ServoCfg {
    pub period_us: u32,
    pub pass_us: u32,
    pub divert_us: u32,
    pub tick_ns: u32,
}

impl Default for ServoCfg {
    fn default() -> Self {
        Self {
            period_us: 20_000,
            pass_us: 1_000,
            divert_us: 2_000,
            tick_ns: 1_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TimingCfg {
    pub tick: Duration,
    pub key_debounce: Duration,
    pub operation_timeout: Duration,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(10),
            key_debounce: Duration::from_millis(200),
            operation_timeout: Duration::from_secs(180),
        }
    }
}

/// One of the two sorting gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    Gate0,
    Gate1,
}

impl Gate {
    pub const fn index(self) -> usize {
        match self {
            Gate::Gate0 => 0,
            Gate::Gate1 => 1,
        }
    }
}

/// Servo command: which gate, and whether it moves to the divert angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateCommand {
    pub gate: Gate,
    pub divert: bool,
}

impl GateCommand {
    pub const fn new(gate: Gate, divert: bool) -> Self {
        Self { gate, divert }
    }
}

/// Gate command issued for each committed category.
#[derive(Debug, Clone, Copy)]
pub struct RoutingCfg {
    pub cap_absent_variant: GateCommand,
    pub cap_present: GateCommand,
    pub no_cap: GateCommand,
    pub other: GateCommand,
}

impl Default for RoutingCfg {
    fn default() -> Self {
        Self {
            cap_absent_variant: GateCommand::new(Gate::Gate1, true),
            cap_present: GateCommand::new(Gate::Gate0, true),
            no_cap: GateCommand::new(Gate::Gate1, false),
            other: GateCommand::new(Gate::Gate0, false),
        }
    }
}

impl RoutingCfg {
    pub fn command_for(&self, c: Category) -> GateCommand {
        match c {
            Category::CapAbsentVariant => self.cap_absent_variant,
            Category::CapPresent => self.cap_present,
            Category::NoCap => self.no_cap,
            Category::Other => self.other,
        }
    }
}
