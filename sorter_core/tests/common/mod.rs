#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sorter_core::{Machine, TimingCfg};
use sorter_hardware::{
    BufferedDisplay, IrqReceiver, KeypadHandle, LatchedKeypad, MemoryStore, SimBottle, SimPin,
    SimulatedColorSensor, SimulatedMotor, SimulatedRtc, irq_line,
};
use sorter_traits::{HwTimer, ManualClock, RtcTime};

/// Gap between simulated bottles, in samples.
pub const GAP: usize = 5;
/// Samples per simulated bottle, gap included.
pub const PASS_LEN: usize = GAP + 8;

#[derive(Debug, Default)]
pub struct TimerState {
    pub enabled: bool,
    pub reloads: Vec<Duration>,
}

/// Timer that records what the machine asked of it and never fires on its own.
#[derive(Debug, Clone, Default)]
pub struct FakeTimer(pub Arc<Mutex<TimerState>>);

impl FakeTimer {
    pub fn enabled(&self) -> bool {
        self.0.lock().unwrap().enabled
    }

    pub fn last_reload(&self) -> Option<Duration> {
        self.0.lock().unwrap().reloads.last().copied()
    }
}

impl HwTimer for FakeTimer {
    fn enable(&mut self) {
        self.0.lock().unwrap().enabled = true;
    }
    fn disable(&mut self) {
        self.0.lock().unwrap().enabled = false;
    }
    fn reload(&mut self, period: Duration) {
        self.0.lock().unwrap().reloads.push(period);
    }
    fn is_enabled(&self) -> bool {
        self.0.lock().unwrap().enabled
    }
}

/// 12:00:00 on 2024-06-15, as the chip stores it.
pub fn noon() -> RtcTime {
    RtcTime::from_registers([0x00, 0x00, 0x12, 0x06, 0x15, 0x06, 0x24])
}

pub struct Rig {
    pub machine: Machine,
    pub keys: KeypadHandle,
    pub irq: IrqReceiver,
    pub display: BufferedDisplay,
    pub store: MemoryStore,
    pub motor: SimulatedMotor,
    pub clock: ManualClock,
    pub pins: [SimPin; 2],
    pub gate_timers: [FakeTimer; 2],
    pub op_timer: FakeTimer,
}

impl Rig {
    /// Machine on simulated peripherals, one bottle of each kind per cycle.
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new(256))
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let (tx, irq) = irq_line();
        let (keypad, keys) = LatchedKeypad::new(tx);
        let clock = ManualClock::new();
        let display = BufferedDisplay::new();
        let motor = SimulatedMotor::new();
        let pins = [SimPin::new(), SimPin::new()];
        let gate_timers = [FakeTimer::default(), FakeTimer::default()];
        let op_timer = FakeTimer::default();

        let machine = Machine::builder()
            .with_color_sensor(SimulatedColorSensor::from_bottles(&SimBottle::CYCLE, GAP))
            .with_rtc(SimulatedRtc::new(clock.clone(), noon()))
            .with_motor(motor.clone())
            .with_gate(sorter_core::Gate::Gate0, pins[0].clone(), gate_timers[0].clone())
            .with_gate(sorter_core::Gate::Gate1, pins[1].clone(), gate_timers[1].clone())
            .with_operation_timer(op_timer.clone())
            .with_keypad(keypad)
            .with_display(display.clone())
            .with_store(store.clone())
            .with_clock(clock.clone())
            .with_timing_cfg(TimingCfg::default())
            .build()
            .expect("machine builds");

        Self {
            machine,
            keys,
            irq,
            display,
            store,
            motor,
            clock,
            pins,
            gate_timers,
            op_timer,
        }
    }

    /// Latch everything the sources raised into the machine.
    pub fn drain(&mut self) {
        while let Ok(f) = self.irq.try_recv() {
            self.machine.raise(f);
        }
    }

    /// Press a key and service the resulting interrupt.
    pub fn press(&mut self, key: char) {
        assert!(self.keys.press(key), "not a key: {key}");
        self.drain();
        self.machine.service_interrupts();
    }

    pub fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.machine.tick();
        }
    }

    pub fn lines(&self) -> [String; 2] {
        self.display.lines()
    }
}
