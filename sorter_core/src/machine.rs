//! The sorter as one owned value.
//!
//! `Machine` holds every peripheral and all shared state. Interrupt branches
//! (`service_interrupts`) and state handlers (`tick`) are methods on it and
//! run on the same thread, so the compiler enforces exclusive access.
//!
//! Data ownership:
//! - written only by interrupt branches: operating state, servo output level,
//!   run timestamps;
//! - written only by state handlers: color samples, pass context, servo
//!   divert selectors;
//! - written by both, inside the critical section only: bin counters
//!   (commit in the Operation handler, reset by the keypad branch).
use std::time::Instant;

use sorter_traits::{
    BoxError, ByteStore, Clock, ColorSensor, Display, HwTimer, IrqFlags, Keypad, Motor,
    RealTimeClock,
};
use tracing::{debug, error, info, trace, warn};

use crate::classifier::{Category, Classifier};
use crate::config::{Gate, RoutingCfg, TimingCfg};
use crate::counters::{BIN_COUNT, Bin, BinCounters, COUNTERS_ADDR, HISTORY_ADDR};
use crate::error::{Fault, HaltReason};
use crate::hw_error::map_hw_error;
use crate::irq::{IrqLatch, IrqMask, IrqSource};
use crate::servo::ServoOutput;
use crate::state::{Command, OperatingState, decode_key, transition};
use crate::util::{elapsed_secs, pad_line};

/// Ticks per animation frame on the Operation screen.
const ANIM_TICKS: usize = 25;
const ANIM_FRAMES: usize = 4;

/// What the main loop should do after a handler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    Running(OperatingState),
    Halted(HaltReason),
}

pub struct Machine {
    pub(crate) state: OperatingState,
    pub(crate) fault: Option<Fault>,

    pub(crate) sensor: Box<dyn ColorSensor>,
    pub(crate) rtc: Box<dyn RealTimeClock>,
    pub(crate) motor: Box<dyn Motor>,
    pub(crate) gates: [ServoOutput; 2],
    pub(crate) op_timer: Box<dyn HwTimer>,
    pub(crate) keypad: Box<dyn Keypad>,
    pub(crate) display: Box<dyn Display>,
    pub(crate) store: Box<dyn ByteStore>,
    pub(crate) clock: Box<dyn Clock>,

    pub(crate) classifier: Classifier,
    pub(crate) routing: RoutingCfg,
    pub(crate) timing: TimingCfg,
    pub(crate) irq: IrqLatch,

    pub(crate) counters: BinCounters,
    pub(crate) history: BinCounters,
    pub(crate) run_active: bool,
    pub(crate) start_s: Option<u32>,
    pub(crate) end_s: Option<u32>,
    pub(crate) elapsed_s: u32,
    pub(crate) page: Option<usize>,
    pub(crate) last_page_key: Option<Instant>,
    pub(crate) anim: usize,
}

impl core::fmt::Debug for Machine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Machine")
            .field("state", &self.state)
            .field("fault", &self.fault)
            .field("counters", &self.counters)
            .field("run_active", &self.run_active)
            .field("pending", &self.irq.pending())
            .finish()
    }
}

impl Machine {
    // ── Observers ────────────────────────────────────────────────────────────

    pub fn state(&self) -> OperatingState {
        self.state
    }

    pub fn fault(&self) -> Option<&Fault> {
        self.fault.as_ref()
    }

    pub fn counters(&self) -> BinCounters {
        self.counters
    }

    pub fn history(&self) -> BinCounters {
        self.history
    }

    /// Run length shown on the BottleTime screen.
    pub fn elapsed_secs(&self) -> u32 {
        self.elapsed_s
    }

    pub fn page(&self) -> Option<usize> {
        self.page
    }

    pub fn is_run_active(&self) -> bool {
        self.run_active
    }

    pub fn gate(&self, gate: Gate) -> &ServoOutput {
        &self.gates[gate.index()]
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn timing(&self) -> &TimingCfg {
        &self.timing
    }

    pub fn pending_interrupts(&self) -> IrqFlags {
        self.irq.pending()
    }

    /// Handle to the global interrupt mask.
    pub fn irq_mask(&self) -> IrqMask {
        self.irq.mask().clone()
    }

    // ── Boot ─────────────────────────────────────────────────────────────────

    /// Restore persisted counters and show the standby screen.
    pub(crate) fn boot(&mut self) {
        match BinCounters::load(self.store.as_mut(), COUNTERS_ADDR) {
            Ok(c) => self.counters = c,
            Err(e) => warn!(error = %e, "counters not restored"),
        }
        match BinCounters::load(self.store.as_mut(), HISTORY_ADDR) {
            Ok(c) => self.history = c,
            Err(e) => warn!(error = %e, "history not restored"),
        }
        info!(total = self.counters.total(), "sorter booted");
        self.show("Standby", "1:Run 2:Cnt 3:Tm");
    }

    // ── Interrupt side ───────────────────────────────────────────────────────

    /// Latch pending bits raised by a source.
    pub fn raise(&mut self, flags: IrqFlags) {
        self.irq.raise(flags);
    }

    /// Service every pending interrupt, one branch per entry in priority
    /// order. Does nothing while the mask is held; bits stay latched.
    pub fn service_interrupts(&mut self) {
        loop {
            if self.state.is_terminal() || self.fault.is_some() {
                // all sources masked for good
                self.irq.clear();
                return;
            }
            match self.irq.take_next() {
                Ok(Some(src)) => self.dispatch(src),
                Ok(None) => return,
                Err(f) => {
                    self.halt_with(f);
                    return;
                }
            }
        }
    }

    fn dispatch(&mut self, src: IrqSource) {
        trace!(?src, "irq");
        match src {
            IrqSource::Keypad => self.on_keypad(),
            IrqSource::Gate0Timer => self.gates[0].on_timer(),
            IrqSource::Gate1Timer => self.gates[1].on_timer(),
            IrqSource::OpTimeout => self.on_op_timeout(),
        }
    }

    fn on_keypad(&mut self) {
        let port = self.keypad.read_port();
        let key = decode_key(port);
        match Command::from_key(key) {
            Some(cmd) => self.apply(cmd),
            None => debug!(%key, "key ignored"),
        }
    }

    fn on_op_timeout(&mut self) {
        if !self.run_active {
            trace!("stale operation timeout ignored");
            return;
        }
        info!("operation timed out");
        self.end_run();
        self.set_state(OperatingState::OperationEnd);
    }

    fn apply(&mut self, cmd: Command) {
        if cmd == Command::NextPage && !self.page_key_accepted() {
            trace!("page key held, ignored");
            return;
        }
        let Some(to) = transition(self.state, cmd) else {
            debug!(?cmd, state = %self.state, "key has no effect here");
            return;
        };
        match cmd {
            Command::Home => {
                self.page = None;
                self.anim = 0;
                self.classifier.reset();
                if self.run_active {
                    self.end_run();
                } else {
                    self.stop_actuators();
                }
            }
            Command::Run => self.begin_run(),
            Command::NextPage => {
                self.page = Some(self.page.map_or(0, |p| (p + 1) % BIN_COUNT));
            }
            Command::RunTime => self.elapsed_s = self.run_length(),
            Command::Clock => {}
            Command::Stop => self.end_run(),
            Command::EmergencyStop => {
                self.stop_actuators();
                self.run_active = false;
                self.irq.clear();
                error!("emergency stop");
            }
        }
        if self.fault.is_none() {
            self.set_state(to);
        }
    }

    fn page_key_accepted(&mut self) -> bool {
        let now = self.clock.now();
        if let Some(last) = self.last_page_key
            && now.saturating_duration_since(last) < self.timing.key_debounce
        {
            return false;
        }
        self.last_page_key = Some(now);
        true
    }

    fn set_state(&mut self, to: OperatingState) {
        if to != self.state {
            debug!(from = %self.state, to = %to, "state transition");
        }
        self.state = to;
    }

    fn begin_run(&mut self) {
        self.history = self.counters;
        self.counters = BinCounters::zero();
        self.persist(HISTORY_ADDR, self.history);
        self.persist(COUNTERS_ADDR, self.counters);

        let Some(now) = self.read_clock_secs() else {
            return;
        };
        self.start_s = Some(now);
        self.end_s = None;
        self.classifier.reset();
        self.anim = 0;

        if let Err(e) = self.motor.start() {
            self.hw_fault(e);
            return;
        }
        for g in &mut self.gates {
            g.enable();
        }
        self.op_timer.reload(self.timing.operation_timeout);
        self.op_timer.enable();
        self.run_active = true;
        info!(start_s = now, previous_total = self.history.total(), "run started");
    }

    fn end_run(&mut self) {
        self.stop_actuators();
        self.run_active = false;
        if let Some(now) = self.read_clock_secs() {
            self.end_s = Some(now);
            self.elapsed_s = self.run_length();
            info!(
                elapsed_s = self.elapsed_s,
                total = self.counters.total(),
                "run ended"
            );
        }
    }

    /// End minus start; while a run is active the clock is read for the end.
    fn run_length(&mut self) -> u32 {
        let Some(start) = self.start_s else {
            return 0;
        };
        let end = match self.end_s {
            Some(e) if !self.run_active => e,
            _ => match self.read_clock_secs() {
                Some(now) => now,
                None => return self.elapsed_s,
            },
        };
        elapsed_secs(start, end)
    }

    fn stop_actuators(&mut self) {
        if let Err(e) = self.motor.stop() {
            self.hw_fault(e);
        }
        for g in &mut self.gates {
            g.disable();
        }
        self.op_timer.disable();
    }

    fn read_clock_secs(&mut self) -> Option<u32> {
        match self.rtc.read_time() {
            Ok(t) => Some(t.seconds_since_midnight()),
            Err(e) => {
                self.hw_fault(e);
                None
            }
        }
    }

    // ── Faults ───────────────────────────────────────────────────────────────

    fn hw_fault(&mut self, e: BoxError) {
        let fault = map_hw_error(&*e).into_fault();
        self.halt_with(fault);
    }

    fn halt_with(&mut self, fault: Fault) {
        if self.fault.is_some() {
            return;
        }
        error!(%fault, "halting");
        self.fault = Some(fault);
        self.irq.clear();
        // best effort: nothing may move while halted
        let _ = self.motor.stop();
        for g in &mut self.gates {
            g.disable();
        }
        self.op_timer.disable();
        self.run_active = false;
    }

    // ── State handlers ───────────────────────────────────────────────────────

    /// Run the current state's handler once.
    pub fn tick(&mut self) -> TickOutcome {
        if let Some(f) = self.fault.clone() {
            self.show(f.headline(), &f.detail());
            return TickOutcome::Halted(HaltReason::Fault(f));
        }
        match self.state {
            OperatingState::Standby => self.show("Standby", "1:Run 2:Cnt 3:Tm"),
            OperatingState::Operation => self.operation_tick(),
            OperatingState::OperationEnd => {
                let total = format!("Total: {}", self.counters.total());
                self.show("Operation done", &total);
            }
            OperatingState::DateTime => self.date_time_tick(),
            OperatingState::BottleCount => self.bottle_count_tick(),
            OperatingState::BottleTime => {
                let secs = format!("{} s", self.elapsed_s);
                self.show("Run time", &secs);
            }
            OperatingState::EmergencyStop => {
                self.show("EMERGENCY STOP", "Reset to resume");
                return TickOutcome::Halted(HaltReason::EmergencyStop);
            }
        }
        match &self.fault {
            Some(f) => TickOutcome::Halted(HaltReason::Fault(f.clone())),
            None => TickOutcome::Running(self.state),
        }
    }

    fn operation_tick(&mut self) {
        let sample = match self.sensor.read_colors() {
            Ok(s) => s,
            Err(e) => {
                self.hw_fault(e);
                return;
            }
        };
        // an interrupt may land between the bus read and classification
        self.service_interrupts();
        if self.state != OperatingState::Operation || self.fault.is_some() {
            return;
        }
        {
            // nothing here services interrupts today; the mask makes any dispatch
            // reached from commit/persist latch instead of touching the counters
            let _mask = self.irq.mask().mask();
            if let Some(category) = self.classifier.feed(sample) {
                self.commit(category);
            }
        }
        self.anim = (self.anim + 1) % (ANIM_TICKS * ANIM_FRAMES);
        let dots = ".".repeat(self.anim / ANIM_TICKS);
        let line1 = format!("Sorting{dots}");
        let line2 = format!("Total: {}", self.counters.total());
        self.show(&line1, &line2);
    }

    fn commit(&mut self, category: Category) {
        self.counters.record(category);
        let cmd = self.routing.command_for(category);
        self.gates[cmd.gate.index()].set_divert(cmd.divert);
        self.persist(COUNTERS_ADDR, self.counters);
        info!(
            %category,
            gate = ?cmd.gate,
            divert = cmd.divert,
            total = self.counters.total(),
            "bottle sorted"
        );
    }

    fn date_time_tick(&mut self) {
        let t = match self.rtc.read_time() {
            Ok(t) => t,
            Err(e) => {
                self.hw_fault(e);
                return;
            }
        };
        let date = format!("{:02x}/{:02x}/{:02x}", t.month, t.day, t.year);
        let time = format!("{:02x}:{:02x}:{:02x}", t.hours, t.minutes, t.seconds & 0x7F);
        self.show(&date, &time);
    }

    fn bottle_count_tick(&mut self) {
        let bin = Bin::ALL[self.page.unwrap_or(0) % BIN_COUNT];
        let line2 = format!("{} Prev:{}", self.counters.get(bin), self.history.get(bin));
        self.show(bin.label(), &line2);
    }

    fn show(&mut self, line1: &str, line2: &str) {
        self.display.home();
        self.display.write_str(&pad_line(line1));
        self.display.newline();
        self.display.write_str(&pad_line(line2));
    }

    fn persist(&mut self, addr: u16, counters: BinCounters) {
        if let Err(e) = counters.save(self.store.as_mut(), addr) {
            warn!(error = %e, addr, "counter write failed");
        }
    }
}
