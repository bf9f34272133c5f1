//! `From` implementations bridging `sorter_config` types to `sorter_core` types.

use std::time::Duration;

use sorter_config::{GateAction, SampleRow};
use sorter_traits::ColorSample;

use crate::config::{ClassifierCfg, Gate, GateCommand, RoutingCfg, ServoCfg, TimingCfg};

// ── ClassifierCfg ────────────────────────────────────────────────────────────

/// Thresholds come from `[classifier]`; the debounce and re-entry policy from `[timing]`.
impl From<&sorter_config::Config> for ClassifierCfg {
    fn from(c: &sorter_config::Config) -> Self {
        let k = &c.classifier;
        Self {
            ambient_clear: k.ambient_clear,
            high_band_clear: k.high_band_clear,
            no_cap_clear: k.no_cap_clear,
            top_ratio_high: k.top_ratio_high,
            bottom_ratio_high: k.bottom_ratio_high,
            ratio_low: k.ratio_low,
            red_noise_floor: k.red_noise_floor,
            commit_debounce: c.timing.commit_debounce,
            allow_reentry: c.timing.allow_reentry,
        }
    }
}

// ── ServoCfg ─────────────────────────────────────────────────────────────────

impl From<&sorter_config::ServoCfg> for ServoCfg {
    fn from(c: &sorter_config::ServoCfg) -> Self {
        Self {
            period_us: c.period_us,
            pass_us: c.pass_us,
            divert_us: c.divert_us,
            tick_ns: c.tick_ns,
        }
    }
}

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&sorter_config::TimingCfg> for TimingCfg {
    fn from(c: &sorter_config::TimingCfg) -> Self {
        Self {
            tick: Duration::from_millis(c.tick_ms),
            key_debounce: Duration::from_millis(c.key_debounce_ms),
            operation_timeout: Duration::from_secs(c.operation_timeout_s),
        }
    }
}

// ── Routing ──────────────────────────────────────────────────────────────────

impl From<GateAction> for GateCommand {
    fn from(a: GateAction) -> Self {
        match a {
            GateAction::Gate0Pass => GateCommand::new(Gate::Gate0, false),
            GateAction::Gate0Divert => GateCommand::new(Gate::Gate0, true),
            GateAction::Gate1Pass => GateCommand::new(Gate::Gate1, false),
            GateAction::Gate1Divert => GateCommand::new(Gate::Gate1, true),
        }
    }
}

impl From<&sorter_config::RoutingCfg> for RoutingCfg {
    fn from(c: &sorter_config::RoutingCfg) -> Self {
        Self {
            cap_absent_variant: c.cap_absent_variant.into(),
            cap_present: c.cap_present.into(),
            no_cap: c.no_cap.into(),
            other: c.other.into(),
        }
    }
}

// ── Samples ──────────────────────────────────────────────────────────────────

/// One recorded trace row as a sensor sample.
pub fn sample_from_row(row: &SampleRow) -> ColorSample {
    ColorSample::new(row.clear, row.red, row.green, row.blue)
}
