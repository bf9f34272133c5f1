//! Host main loop: state handler once per tick, interrupt service at every
//! wait point.
//!
//! Interrupt sources (keypad, software timers) run on their own threads and
//! send `IrqFlags` over a channel. The loop drains the channel into the
//! machine's latch before each handler run and services each flag as it
//! arrives while waiting out the rest of the tick.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use sorter_traits::IrqFlags;
use tracing::{info, warn};

use crate::counters::BinCounters;
use crate::error::{HaltReason, Result, SorterError};
use crate::machine::{Machine, TickOutcome};
use crate::state::OperatingState;

/// How often the halt screen is redrawn.
const HALT_REDRAW: Duration = Duration::from_secs(1);

/// Summary returned when the loop stops on request.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub ticks: u64,
    pub state: OperatingState,
    pub counters: BinCounters,
    pub history: BinCounters,
}

pub struct Runner {
    machine: Machine,
    irq: Receiver<IrqFlags>,
    shutdown: Arc<AtomicBool>,
    max_ticks: Option<u64>,
}

impl Runner {
    pub fn new(machine: Machine, irq: Receiver<IrqFlags>) -> Self {
        Self {
            machine,
            irq,
            shutdown: Arc::new(AtomicBool::new(false)),
            max_ticks: None,
        }
    }

    /// Share an external stop flag (e.g. set from a Ctrl-C handler).
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    /// Stop after this many ticks; used by tests and bounded demo runs.
    pub fn with_max_ticks(mut self, n: u64) -> Self {
        self.max_ticks = Some(n);
        self
    }

    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    fn should_stop(&self, ticks: u64) -> bool {
        self.shutdown.load(Ordering::Relaxed) || self.max_ticks.is_some_and(|m| ticks >= m)
    }

    /// Run until shutdown or the tick limit. A halt (emergency stop or fault)
    /// keeps the halt screen up until then and is returned as an error.
    pub fn run(&mut self) -> Result<RunReport> {
        let tick = self.machine.timing().tick;
        let mut ticks = 0u64;
        info!(tick_ms = tick.as_millis(), "main loop started");

        while !self.should_stop(ticks) {
            self.drain();
            self.machine.service_interrupts();
            let outcome = self.machine.tick();
            ticks += 1;
            if let TickOutcome::Halted(reason) = outcome {
                return Err(self.halted(reason, ticks));
            }
            self.wait(tick);
        }

        info!(ticks, state = %self.machine.state(), "main loop stopped");
        Ok(self.report(ticks))
    }

    fn report(&self, ticks: u64) -> RunReport {
        RunReport {
            ticks,
            state: self.machine.state(),
            counters: self.machine.counters(),
            history: self.machine.history(),
        }
    }

    /// Hold the halt screen. Nothing but a reset leaves this.
    fn halted(&mut self, reason: HaltReason, mut ticks: u64) -> eyre::Report {
        warn!(%reason, "machine halted; reset required");
        let tick = self.machine.timing().tick;
        let mut last_redraw = Instant::now();
        while !self.should_stop(ticks) {
            // sources are masked for good; discard whatever still arrives
            while self.irq.try_recv().is_ok() {}
            if last_redraw.elapsed() >= HALT_REDRAW {
                let _ = self.machine.tick();
                last_redraw = Instant::now();
            }
            self.machine.clock.sleep(tick);
            ticks += 1;
        }
        eyre::Report::new(SorterError::Halted(reason))
    }

    fn drain(&mut self) {
        while let Ok(flags) = self.irq.try_recv() {
            self.machine.raise(flags);
        }
    }

    /// Wait out the rest of the tick, servicing interrupts as they arrive.
    fn wait(&mut self, tick: Duration) {
        let deadline = Instant::now() + tick;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }
            match self.irq.recv_timeout(remaining) {
                Ok(flags) => {
                    self.machine.raise(flags);
                    self.machine.service_interrupts();
                }
                Err(RecvTimeoutError::Timeout) => return,
                Err(RecvTimeoutError::Disconnected) => {
                    self.machine.clock.sleep(remaining);
                    return;
                }
            }
        }
    }
}
