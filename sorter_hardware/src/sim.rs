//! Host simulation backends.
//!
//! These stand in for the physical peripherals so the sorter can run, be
//! demoed and be tested on a workstation. Shared handles (`Arc`) let a test or
//! the CLI observe what the machine did after handing the backend over.
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use sorter_traits::types::bin_to_bcd;
use sorter_traits::{
    BoxError, ByteStore, Clock, ColorSample, ColorSensor, Display, IrqFlags, Keypad, Motor,
    OutputPin, RealTimeClock, RtcTime, code_for_key,
};

use crate::error::HwError;
use crate::timer::IrqSender;

/// Kinds of bottle the simulated fixture carries past the sensor, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimBottle {
    /// Strongly red-reflective cap region.
    CapAbsentVariant,
    /// Blue-dominant, absorptive cap region.
    CapPresent,
    /// Very bright, neutral pass.
    NoCap,
    /// Neutral pass that matches nothing.
    Other,
}

impl SimBottle {
    pub const CYCLE: [SimBottle; 4] = [
        SimBottle::CapAbsentVariant,
        SimBottle::CapPresent,
        SimBottle::NoCap,
        SimBottle::Other,
    ];

    /// Top-band sample for this kind of bottle.
    fn top(self) -> ColorSample {
        match self {
            SimBottle::CapAbsentVariant => ColorSample::new(60, 40, 20, 10),
            SimBottle::CapPresent => ColorSample::new(60, 8, 12, 16),
            SimBottle::NoCap => ColorSample::new(400, 100, 100, 100),
            SimBottle::Other => ColorSample::new(60, 20, 20, 20),
        }
    }
}

const AMBIENT: ColorSample = ColorSample::new(10, 3, 3, 3);
const SHOULDER: ColorSample = ColorSample::new(26, 8, 8, 8);

/// One bottle pass: ambient gap, shoulder, top band, shoulder.
fn pass(bottle: SimBottle, gap: usize) -> Vec<ColorSample> {
    let mut v = vec![AMBIENT; gap];
    v.extend([SHOULDER; 2]);
    v.extend(std::iter::repeat_n(bottle.top(), 4));
    v.extend([SHOULDER; 2]);
    v
}

/// Color sensor replaying a repeating bottle-pass waveform, one sample per read.
pub struct SimulatedColorSensor {
    wave: Vec<ColorSample>,
    pos: usize,
}

impl SimulatedColorSensor {
    /// Cycle through every kind in [`SimBottle::CYCLE`] with `gap` ambient
    /// samples between bottles.
    pub fn new(gap: usize) -> Self {
        Self::from_bottles(&SimBottle::CYCLE, gap)
    }

    pub fn from_bottles(bottles: &[SimBottle], gap: usize) -> Self {
        let wave = bottles.iter().flat_map(|&b| pass(b, gap)).collect();
        Self::from_samples(wave)
    }

    /// Replay an explicit sample sequence, wrapping at the end.
    pub fn from_samples(wave: Vec<ColorSample>) -> Self {
        Self { wave, pos: 0 }
    }
}

impl ColorSensor for SimulatedColorSensor {
    fn read_colors(&mut self) -> Result<ColorSample, BoxError> {
        if self.wave.is_empty() {
            return Ok(AMBIENT);
        }
        let s = self.wave[self.pos];
        self.pos = (self.pos + 1) % self.wave.len();
        Ok(s)
    }
}

/// Real-time clock that counts from a set time using a host `Clock`.
///
/// Only the time of day advances; the date registers stay as last set.
pub struct SimulatedRtc<C: Clock> {
    clock: C,
    base: RtcTime,
    set_at: Instant,
}

impl<C: Clock> SimulatedRtc<C> {
    pub fn new(clock: C, start: RtcTime) -> Self {
        let set_at = clock.now();
        Self {
            clock,
            base: start,
            set_at,
        }
    }
}

impl<C: Clock> RealTimeClock for SimulatedRtc<C> {
    fn read_time(&mut self) -> Result<RtcTime, BoxError> {
        let elapsed = self.clock.now().saturating_duration_since(self.set_at);
        let secs = (u64::from(self.base.seconds_since_midnight()) + elapsed.as_secs()) % 86_400;
        let mut t = self.base;
        t.hours = bin_to_bcd((secs / 3600) as u8);
        t.minutes = bin_to_bcd(((secs / 60) % 60) as u8);
        // preserve the clock-halt bit
        t.seconds = (self.base.seconds & 0x80) | bin_to_bcd((secs % 60) as u8);
        Ok(t)
    }

    fn set_time(&mut self, time: &RtcTime) -> Result<(), BoxError> {
        self.base = *time;
        self.set_at = self.clock.now();
        tracing::debug!(time = %time, "sim rtc set");
        Ok(())
    }
}

/// Motor whose running state is observable through a shared flag.
#[derive(Debug, Clone, Default)]
pub struct SimulatedMotor {
    running: Arc<AtomicBool>,
}

impl SimulatedMotor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl Motor for SimulatedMotor {
    fn start(&mut self) -> Result<(), BoxError> {
        self.running.store(true, Ordering::Relaxed);
        tracing::debug!("motor started (simulated)");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        self.running.store(false, Ordering::Relaxed);
        tracing::debug!("motor stopped (simulated)");
        Ok(())
    }
}

/// Output pin backed by a shared level.
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    level: Arc<AtomicBool>,
}

impl SimPin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OutputPin for SimPin {
    fn set_high(&mut self) {
        self.level.store(true, Ordering::Relaxed);
    }
    fn set_low(&mut self) {
        self.level.store(false, Ordering::Relaxed);
    }
    fn is_set_high(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }
}

pub const DISPLAY_COLS: usize = 16;
pub const DISPLAY_ROWS: usize = 2;

#[derive(Debug, Clone)]
struct Frame {
    cells: [[u8; DISPLAY_COLS]; DISPLAY_ROWS],
    row: usize,
    col: usize,
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            cells: [[b' '; DISPLAY_COLS]; DISPLAY_ROWS],
            row: 0,
            col: 0,
        }
    }
}

impl Frame {
    fn put(&mut self, text: &str) {
        for ch in text.chars() {
            if self.col >= DISPLAY_COLS {
                break;
            }
            self.cells[self.row][self.col] = if ch.is_ascii() { ch as u8 } else { b'?' };
            self.col += 1;
        }
    }

    fn line(&self, row: usize) -> String {
        String::from_utf8_lossy(&self.cells[row]).trim_end().to_string()
    }
}

/// 2x16 character display that keeps its cells in memory.
///
/// Writes overwrite cells from the cursor and are clipped at column 16.
#[derive(Debug, Clone, Default)]
pub struct BufferedDisplay {
    frame: Arc<Mutex<Frame>>,
}

impl BufferedDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text of row `row` with trailing blanks removed.
    pub fn line(&self, row: usize) -> String {
        self.frame
            .lock()
            .map(|f| f.line(row.min(DISPLAY_ROWS - 1)))
            .unwrap_or_default()
    }

    pub fn lines(&self) -> [String; DISPLAY_ROWS] {
        [self.line(0), self.line(1)]
    }

    fn with_frame(&self, f: impl FnOnce(&mut Frame)) {
        if let Ok(mut frame) = self.frame.lock() {
            f(&mut frame);
        }
    }
}

impl Display for BufferedDisplay {
    fn home(&mut self) {
        self.with_frame(|f| {
            f.row = 0;
            f.col = 0;
        });
    }
    fn newline(&mut self) {
        self.with_frame(|f| {
            f.row = 1;
            f.col = 0;
        });
    }
    fn write_str(&mut self, text: &str) {
        self.with_frame(|f| f.put(text));
    }
}

/// Display that prints each changed frame to stdout.
///
/// A frame is considered complete when the next one begins with `home()`.
#[derive(Debug, Default)]
pub struct ConsoleDisplay {
    buf: BufferedDisplay,
    last: Option<[String; DISPLAY_ROWS]>,
}

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush(&mut self) {
        let now = self.buf.lines();
        if self.last.as_ref() != Some(&now) {
            println!("+{}+", "-".repeat(DISPLAY_COLS));
            for l in &now {
                println!("|{l:<DISPLAY_COLS$}|");
            }
            println!("+{}+", "-".repeat(DISPLAY_COLS));
            self.last = Some(now);
        }
    }
}

impl Display for ConsoleDisplay {
    fn home(&mut self) {
        self.flush();
        self.buf.home();
    }
    fn newline(&mut self) {
        self.buf.newline();
    }
    fn write_str(&mut self, text: &str) {
        self.buf.write_str(text);
    }
}

/// Erased EEPROM cell value.
pub const ERASED: u8 = 0xFF;

/// Byte store held in memory; clones share contents.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemoryStore {
    pub fn new(size: usize) -> Self {
        Self {
            bytes: Arc::new(Mutex::new(vec![ERASED; size])),
        }
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

impl ByteStore for MemoryStore {
    fn read(&mut self, addr: u16) -> Result<u8, BoxError> {
        let bytes = self.bytes.lock().map_err(|_| HwError::Gpio("store poisoned".into()))?;
        bytes
            .get(usize::from(addr))
            .copied()
            .ok_or_else(|| HwError::StoreRange(addr).into())
    }

    fn write(&mut self, addr: u16, value: u8) -> Result<(), BoxError> {
        let mut bytes = self.bytes.lock().map_err(|_| HwError::Gpio("store poisoned".into()))?;
        let cell = bytes
            .get_mut(usize::from(addr))
            .ok_or(HwError::StoreRange(addr))?;
        *cell = value;
        Ok(())
    }
}

/// Keypad whose port holds the last pressed key, like the encoder's latch.
#[derive(Debug, Clone, Default)]
pub struct LatchedKeypad {
    port: Arc<AtomicU8>,
}

impl LatchedKeypad {
    /// Keypad plus the handle used to press keys on it.
    pub fn new(irq: IrqSender) -> (Self, KeypadHandle) {
        let pad = Self::default();
        let handle = KeypadHandle {
            port: pad.port.clone(),
            irq,
        };
        (pad, handle)
    }
}

impl Keypad for LatchedKeypad {
    fn read_port(&mut self) -> u8 {
        self.port.load(Ordering::Relaxed)
    }
}

/// Presses keys: latches the code into the upper nibble, then raises the
/// keypad interrupt (the encoder's data-available edge).
#[derive(Debug, Clone)]
pub struct KeypadHandle {
    port: Arc<AtomicU8>,
    irq: IrqSender,
}

impl KeypadHandle {
    /// Returns false for a character that is not on the keypad or when
    /// nobody is listening any more.
    pub fn press(&self, key: char) -> bool {
        let Some(code) = code_for_key(key.to_ascii_uppercase()) else {
            return false;
        };
        self.port.store(code << 4, Ordering::Relaxed);
        self.irq.send(IrqFlags::KEYPAD).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::irq_line;
    use sorter_traits::ManualClock;
    use std::time::Duration;

    #[test]
    fn waveform_crosses_ambient_once_per_bottle() {
        let mut s = SimulatedColorSensor::new(5);
        let mut rises = 0;
        let mut prev = 0u16;
        for _ in 0..(4 * 13) {
            let c = s.read_colors().unwrap().clear;
            if prev <= 22 && c > 22 {
                rises += 1;
            }
            prev = c;
        }
        assert_eq!(rises, 4);
    }

    #[test]
    fn rtc_advances_with_clock() {
        let clock = ManualClock::new();
        let start = RtcTime::from_registers([0x58, 0x59, 0x23, 0x01, 0x01, 0x01, 0x24]);
        let mut rtc = SimulatedRtc::new(clock.clone(), start);
        clock.advance(Duration::from_secs(3));
        let t = rtc.read_time().unwrap();
        // wraps past midnight without touching the date
        assert_eq!((t.hours, t.minutes, t.seconds), (0x00, 0x00, 0x01));
        assert_eq!(t.day, 0x01);
    }

    #[test]
    fn back_to_back_reads_differ_only_in_seconds() {
        let clock = ManualClock::new();
        let start = RtcTime::from_registers([0x10, 0x30, 0x12, 0x03, 0x14, 0x05, 0x24]);
        let mut rtc = SimulatedRtc::new(clock.clone(), start);
        let a = rtc.read_time().unwrap();
        clock.advance(Duration::from_millis(900));
        let b = rtc.read_time().unwrap();
        assert_eq!(a.to_registers()[1..], b.to_registers()[1..]);
        assert!(b.seconds >= a.seconds);
    }

    #[test]
    fn display_clips_and_overwrites() {
        let mut d = BufferedDisplay::new();
        d.home();
        d.write_str("0123456789abcdefXYZ");
        d.newline();
        d.write_str("hi");
        d.home();
        d.write_str("AB");
        assert_eq!(d.line(0), "AB23456789abcdef");
        assert_eq!(d.line(1), "hi");
    }

    #[test]
    fn memory_store_starts_erased_and_bounds_checks() {
        let mut m = MemoryStore::new(4);
        assert_eq!(m.read(0).unwrap(), ERASED);
        m.write(3, 7).unwrap();
        assert_eq!(m.snapshot(), vec![ERASED, ERASED, ERASED, 7]);
        assert!(m.write(4, 1).is_err());
    }

    #[test]
    fn keypad_press_latches_code_and_raises_irq() {
        let (tx, rx) = irq_line();
        let (mut pad, handle) = LatchedKeypad::new(tx);
        assert!(handle.press('#'));
        assert_eq!(pad.read_port() >> 4, 14);
        assert_eq!(rx.try_recv().unwrap(), IrqFlags::KEYPAD);
        assert!(!handle.press('x'));
    }
}
