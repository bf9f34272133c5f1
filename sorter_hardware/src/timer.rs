//! Software stand-in for the microcontroller's reloadable timers.
//!
//! Each `SoftTimer` owns one thread. Control calls (`enable`, `disable`,
//! `reload`) are forwarded over a channel; on every overflow the thread raises
//! the timer's flag on the shared interrupt line and re-arms with the last
//! loaded period. The thread is shut down and joined when the timer is dropped.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use sorter_traits::{HwTimer, IrqFlags};

/// Sending half of the pending-interrupt line. Sources raise bits; the core
/// latches and dispatches them.
pub type IrqSender = xch::Sender<IrqFlags>;
pub type IrqReceiver = xch::Receiver<IrqFlags>;

/// Create the interrupt line shared by every source.
pub fn irq_line() -> (IrqSender, IrqReceiver) {
    xch::unbounded()
}

enum Ctl {
    Enable,
    Disable,
    Reload(Duration),
}

pub struct SoftTimer {
    name: &'static str,
    ctl: xch::Sender<Ctl>,
    enabled: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl SoftTimer {
    /// Spawn a disabled timer that raises `flag` on `irq` at every overflow.
    pub fn spawn(name: &'static str, flag: IrqFlags, irq: IrqSender, period: Duration) -> Self {
        let (ctl, ctl_rx) = xch::unbounded::<Ctl>();
        let enabled = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            let mut period = period;
            let mut deadline: Option<Instant> = None;
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                let msg = match deadline {
                    Some(at) => ctl_rx.recv_timeout(at.saturating_duration_since(Instant::now())),
                    None => ctl_rx
                        .recv()
                        .map_err(|_| xch::RecvTimeoutError::Disconnected),
                };
                match msg {
                    Ok(Ctl::Enable) => {
                        if deadline.is_none() {
                            deadline = Some(Instant::now() + period);
                        }
                    }
                    Ok(Ctl::Disable) => deadline = None,
                    Ok(Ctl::Reload(p)) => {
                        period = p;
                        if deadline.is_some() {
                            deadline = Some(Instant::now() + period);
                        }
                    }
                    Err(xch::RecvTimeoutError::Timeout) => {
                        if irq.send(flag).is_err() {
                            tracing::debug!(timer = name, "irq line closed, timer exiting");
                            break;
                        }
                        let now = Instant::now();
                        // keep phase unless we fell more than one period behind
                        deadline = deadline.map(|d| {
                            let next = d + period;
                            if next <= now { now + period } else { next }
                        });
                    }
                    Err(xch::RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::trace!(timer = name, "timer thread exiting cleanly");
        });

        Self {
            name,
            ctl,
            enabled,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    fn send(&self, c: Ctl) {
        if self.ctl.send(c).is_err() {
            tracing::warn!(timer = self.name, "timer thread gone");
        }
    }
}

impl HwTimer for SoftTimer {
    fn enable(&mut self) {
        self.enabled.store(true, Ordering::Relaxed);
        self.send(Ctl::Enable);
    }

    fn disable(&mut self) {
        self.enabled.store(false, Ordering::Relaxed);
        self.send(Ctl::Disable);
    }

    fn reload(&mut self, period: Duration) {
        self.send(Ctl::Reload(period));
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

impl Drop for SoftTimer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // wakes a thread blocked in recv()
        let _ = self.ctl.send(Ctl::Disable);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!(timer = self.name, "timer thread joined"),
                Err(e) => tracing::warn!(?e, timer = self.name, "timer thread panicked"),
            }
        }
    }
}
