#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and sample-trace parsing for the bottle sorter.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//!   Every section has defaults, so an empty file is a complete config.
//! - The sample-trace CSV loader enforces headers and rejects malformed rows;
//!   traces feed the offline replay used to tune classifier thresholds.
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

/// Recorded color-sensor sample.
///
/// Expected headers:
/// clear,red,green,blue
///
/// Example:
/// clear,red,green,blue
/// 10,3,3,3
/// 60,40,20,10
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SampleRow {
    pub clear: u16,
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

/// BCM pin numbers for the hardware backend.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Pins {
    pub scl: u8,
    pub sda: u8,
    pub gate0: u8,
    pub gate1: u8,
    pub motor_en: u8,
    /// Keypad encoder data lines, least significant first.
    pub key_data: [u8; 4],
    /// Keypad encoder data-available line.
    pub key_da: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            scl: 3,
            sda: 2,
            gate0: 17,
            gate1: 27,
            motor_en: 22,
            key_data: [5, 6, 13, 19],
            key_da: 26,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BusCfg {
    /// Half of one SCL period in microseconds (5 = 100 kHz).
    pub half_period_us: u64,
    /// Longest a released line may stay low before the bus is declared stuck.
    pub stretch_timeout_ms: u64,
}

impl Default for BusCfg {
    fn default() -> Self {
        Self {
            half_period_us: 5,
            stretch_timeout_ms: 25,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClassifierCfg {
    /// Clear-channel level above which a bottle is in front of the sensor.
    pub ambient_clear: u16,
    /// Clear-channel level of the top (cap) band.
    pub high_band_clear: u16,
    /// Clear-channel level above which a pass is flagged as uncapped.
    pub no_cap_clear: u16,
    pub top_ratio_high: f32,
    pub bottom_ratio_high: f32,
    pub ratio_low: f32,
    /// Minimum red reading for a high red/blue ratio to count.
    pub red_noise_floor: u16,
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
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServoCfg {
    pub period_us: u32,
    pub pass_us: u32,
    pub divert_us: u32,
    /// Duration of one timer count in nanoseconds.
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

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TimingCfg {
    /// Main-loop delay between handler runs.
    pub tick_ms: u64,
    /// Consecutive readings at or below ambient needed to commit a pass.
    pub commit_debounce: u8,
    /// Minimum spacing between two accepted presses of the page key.
    pub key_debounce_ms: u64,
    /// Length of one sorting run before the timeout interrupt ends it.
    pub operation_timeout_s: u64,
    /// Accept a new rising edge while a pass is still open (legacy double count).
    pub allow_reentry: bool,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            commit_debounce: 3,
            key_debounce_ms: 200,
            operation_timeout_s: 180,
            allow_reentry: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageCfg {
    /// Backing file for the byte store; in-memory when absent.
    pub path: Option<String>,
    pub size: usize,
}

impl Default for StorageCfg {
    fn default() -> Self {
        Self {
            path: None,
            size: 256,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Servo command issued for a committed category.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum GateAction {
    Gate0Pass,
    Gate0Divert,
    Gate1Pass,
    Gate1Divert,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RoutingCfg {
    pub cap_absent_variant: GateAction,
    pub cap_present: GateAction,
    pub no_cap: GateAction,
    pub other: GateAction,
}

impl Default for RoutingCfg {
    fn default() -> Self {
        Self {
            cap_absent_variant: GateAction::Gate1Divert,
            cap_present: GateAction::Gate0Divert,
            no_cap: GateAction::Gate1Pass,
            other: GateAction::Gate0Pass,
        }
    }
}

/// Host simulation knobs.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimCfg {
    /// Ambient samples between two simulated bottles.
    pub gap_samples: usize,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self { gap_samples: 20 }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub bus: BusCfg,
    pub classifier: ClassifierCfg,
    pub servo: ServoCfg,
    pub timing: TimingCfg,
    pub storage: StorageCfg,
    pub logging: Logging,
    pub routing: RoutingCfg,
    pub sim: SimCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Parse a sample trace from any reader. Headers must be exactly
/// `clear,red,green,blue`.
pub fn parse_sample_trace(reader: impl Read) -> eyre::Result<Vec<SampleRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers: {}", e))?
        .clone();
    let expected = ["clear", "red", "green", "blue"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "sample trace CSV must have headers 'clear,red,green,blue', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<SampleRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }
    if rows.is_empty() {
        eyre::bail!("sample trace is empty");
    }
    Ok(rows)
}

pub fn load_sample_trace_csv(path: &Path) -> eyre::Result<Vec<SampleRow>> {
    let file = std::fs::File::open(path)
        .map_err(|e| eyre::eyre!("open sample trace CSV {:?}: {}", path, e))?;
    parse_sample_trace(file)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Bus
        if self.bus.half_period_us == 0 {
            eyre::bail!("bus.half_period_us must be >= 1");
        }
        if self.bus.stretch_timeout_ms == 0 {
            eyre::bail!("bus.stretch_timeout_ms must be >= 1");
        }

        // Classifier
        let c = &self.classifier;
        if c.ambient_clear == 0 {
            eyre::bail!("classifier.ambient_clear must be > 0");
        }
        if c.high_band_clear <= c.ambient_clear {
            eyre::bail!("classifier.high_band_clear must be > classifier.ambient_clear");
        }
        if c.no_cap_clear <= c.high_band_clear {
            eyre::bail!("classifier.no_cap_clear must be > classifier.high_band_clear");
        }
        for (name, v) in [
            ("top_ratio_high", c.top_ratio_high),
            ("bottom_ratio_high", c.bottom_ratio_high),
            ("ratio_low", c.ratio_low),
        ] {
            if !(v.is_finite() && v > 0.0) {
                eyre::bail!("classifier.{name} must be a finite value > 0.0");
            }
        }
        if c.ratio_low >= c.top_ratio_high || c.ratio_low >= c.bottom_ratio_high {
            eyre::bail!("classifier.ratio_low must be below both high ratios");
        }

        // Servo
        let s = &self.servo;
        if s.tick_ns == 0 {
            eyre::bail!("servo.tick_ns must be >= 1");
        }
        if s.pass_us == 0 || s.divert_us == 0 {
            eyre::bail!("servo.pass_us and servo.divert_us must be > 0");
        }
        if s.period_us <= s.pass_us.max(s.divert_us) {
            eyre::bail!("servo.period_us must exceed both pulse widths");
        }

        // Timing
        if self.timing.tick_ms == 0 {
            eyre::bail!("timing.tick_ms must be >= 1");
        }
        if self.timing.tick_ms > 1000 {
            eyre::bail!("timing.tick_ms is unreasonably large (>1s)");
        }
        if self.timing.commit_debounce == 0 {
            eyre::bail!("timing.commit_debounce must be >= 1");
        }
        if self.timing.operation_timeout_s == 0 {
            eyre::bail!("timing.operation_timeout_s must be >= 1");
        }
        if self.timing.operation_timeout_s > 24 * 60 * 60 {
            eyre::bail!("timing.operation_timeout_s is unreasonably large (>24h)");
        }

        // Storage: counters (0x00..0x0A) and history (0x10..0x1A)
        if self.storage.size < 0x1A {
            eyre::bail!("storage.size must be >= 26 bytes");
        }
        if self.storage.size > usize::from(u16::MAX) + 1 {
            eyre::bail!("storage.size must fit a 16-bit address space");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
