//! Bit-banged I2C master shared by the real-time clock and the color sensor.
//!
//! Every primitive is a fixed sequence of line toggles separated by one
//! half-period. Released lines are pulled up externally, so a slave may hold
//! SCL low (clock stretching); each wait for a released line to rise is bounded
//! by `stretch_timeout` and reported as `BusError::Stuck`.
//!
//! Worst-case durations, with `h` the half-period and `t` the stretch timeout:
//! - `start()` / `stop()`: 3h + t
//! - `write()` / `read()`: 9 bit slots of 2h + t each, so 18h + 9t
//!
//! A nack from the addressed device is returned to the caller but is not an
//! error; the peripheral clients in this crate do not act on it.
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use sorter_traits::Clock;
use tracing::trace;

use crate::error::{BusError, Line};
use crate::util::wait_until_high_with_timeout;

/// Open-drain access to the two bus lines.
///
/// `release_*` lets the pull-up take the line high; `drive_*_low` sinks it.
pub trait BusLines {
    fn release_scl(&mut self);
    fn drive_scl_low(&mut self);
    fn release_sda(&mut self);
    fn drive_sda_low(&mut self);
    fn scl_is_high(&mut self) -> bool;
    fn sda_is_high(&mut self) -> bool;
}

/// Acknowledge bit sampled after a written byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Ack,
    Nack,
}

/// Byte-level master primitives.
pub trait I2cMaster {
    fn start(&mut self) -> Result<(), BusError>;
    fn stop(&mut self) -> Result<(), BusError>;
    fn write(&mut self, byte: u8) -> Result<Ack, BusError>;
    /// Clock in one byte. `send_ack = false` is used for the last byte of a read burst.
    fn read(&mut self, send_ack: bool) -> Result<u8, BusError>;
}

/// Bus timing parameters.
#[derive(Debug, Clone, Copy)]
pub struct BusTiming {
    pub half_period: Duration,
    pub stretch_timeout: Duration,
}

impl Default for BusTiming {
    fn default() -> Self {
        // 100 kHz standard mode
        Self {
            half_period: Duration::from_micros(5),
            stretch_timeout: Duration::from_millis(25),
        }
    }
}

pub struct BitBangI2c<L: BusLines, C: Clock> {
    lines: L,
    clock: C,
    timing: BusTiming,
}

impl<L: BusLines, C: Clock> BitBangI2c<L, C> {
    pub fn new(mut lines: L, clock: C, timing: BusTiming) -> Self {
        // idle: both lines released
        lines.release_sda();
        lines.release_scl();
        Self {
            lines,
            clock,
            timing,
        }
    }

    pub fn into_lines(self) -> L {
        self.lines
    }

    #[inline]
    fn delay(&self) {
        self.clock.sleep(self.timing.half_period);
    }

    fn raise_scl(&mut self) -> Result<(), BusError> {
        self.lines.release_scl();
        let lines = &mut self.lines;
        wait_until_high_with_timeout(
            || lines.scl_is_high(),
            Line::Scl,
            self.timing.stretch_timeout,
            &self.clock,
        )
    }

    fn raise_sda(&mut self) -> Result<(), BusError> {
        self.lines.release_sda();
        let lines = &mut self.lines;
        wait_until_high_with_timeout(
            || lines.sda_is_high(),
            Line::Sda,
            self.timing.stretch_timeout,
            &self.clock,
        )
    }

    fn write_bit(&mut self, bit: bool) -> Result<(), BusError> {
        if bit {
            self.lines.release_sda();
        } else {
            self.lines.drive_sda_low();
        }
        self.delay();
        self.raise_scl()?;
        self.delay();
        self.lines.drive_scl_low();
        Ok(())
    }

    fn read_bit(&mut self) -> Result<bool, BusError> {
        self.lines.release_sda();
        self.delay();
        self.raise_scl()?;
        self.delay();
        let bit = self.lines.sda_is_high();
        self.lines.drive_scl_low();
        Ok(bit)
    }
}

impl<L: BusLines, C: Clock> I2cMaster for BitBangI2c<L, C> {
    fn start(&mut self) -> Result<(), BusError> {
        self.raise_sda()?;
        self.raise_scl()?;
        self.delay();
        self.lines.drive_sda_low();
        self.delay();
        self.lines.drive_scl_low();
        self.delay();
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BusError> {
        self.lines.drive_sda_low();
        self.delay();
        self.raise_scl()?;
        self.delay();
        self.raise_sda()?;
        self.delay();
        Ok(())
    }

    fn write(&mut self, byte: u8) -> Result<Ack, BusError> {
        for i in (0..8).rev() {
            self.write_bit(byte & (1 << i) != 0)?;
        }
        let ack = if self.read_bit()? { Ack::Nack } else { Ack::Ack };
        trace!(byte, ?ack, "i2c write");
        Ok(ack)
    }

    fn read(&mut self, send_ack: bool) -> Result<u8, BusError> {
        let mut value = 0u8;
        for _ in 0..8 {
            value = (value << 1) | u8::from(self.read_bit()?);
        }
        // ack is a low bit
        self.write_bit(!send_ack)?;
        trace!(value, send_ack, "i2c read");
        Ok(value)
    }
}

/// Handle to one bus shared by several peripheral clients on the same core.
///
/// A transaction holds the bus from its start condition to its stop
/// condition; a nested transaction is refused with `BusError::Busy`.
pub struct SharedBus<B: I2cMaster> {
    inner: Rc<RefCell<B>>,
}

impl<B: I2cMaster> Clone for SharedBus<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<B: I2cMaster> SharedBus<B> {
    pub fn new(bus: B) -> Self {
        Self {
            inner: Rc::new(RefCell::new(bus)),
        }
    }

    pub fn transaction<R>(
        &self,
        f: impl FnOnce(&mut B) -> Result<R, BusError>,
    ) -> Result<R, BusError> {
        let mut bus = self.inner.try_borrow_mut().map_err(|_| BusError::Busy)?;
        f(&mut bus)
    }
}

/// Address byte for a write transfer.
#[inline]
pub fn write_addr(addr7: u8) -> u8 {
    addr7 << 1
}

/// Address byte for a read transfer.
#[inline]
pub fn read_addr(addr7: u8) -> u8 {
    (addr7 << 1) | 1
}
