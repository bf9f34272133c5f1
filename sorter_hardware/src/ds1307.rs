//! DS1307-style real-time clock on the shared bus.
use sorter_traits::{BoxError, RealTimeClock, RtcTime};

use crate::error::{BusError, HwError};
use crate::i2c::{I2cMaster, SharedBus, read_addr, write_addr};

pub const DS1307_ADDR: u8 = 0x68;

/// Register pointer of the seconds register, the first of seven time registers.
const TIME_REG: u8 = 0x00;

pub struct Ds1307<B: I2cMaster> {
    bus: SharedBus<B>,
    addr: u8,
}

impl<B: I2cMaster> Ds1307<B> {
    pub fn new(bus: SharedBus<B>) -> Self {
        Self {
            bus,
            addr: DS1307_ADDR,
        }
    }

    fn read_registers(&self) -> Result<[u8; 7], BusError> {
        self.bus.transaction(|bus| {
            // reset the register pointer, then burst-read from it
            bus.start()?;
            bus.write(write_addr(self.addr))?;
            bus.write(TIME_REG)?;
            bus.stop()?;

            bus.start()?;
            bus.write(read_addr(self.addr))?;
            let mut regs = [0u8; 7];
            for (i, r) in regs.iter_mut().enumerate() {
                *r = bus.read(i < 6)?;
            }
            bus.stop()?;
            Ok(regs)
        })
    }

    fn write_registers(&self, regs: [u8; 7]) -> Result<(), BusError> {
        self.bus.transaction(|bus| {
            bus.start()?;
            bus.write(write_addr(self.addr))?;
            bus.write(TIME_REG)?;
            for r in regs {
                bus.write(r)?;
            }
            bus.stop()
        })
    }
}

impl<B: I2cMaster> RealTimeClock for Ds1307<B> {
    fn read_time(&mut self) -> Result<RtcTime, BoxError> {
        let regs = self.read_registers().map_err(HwError::from)?;
        let t = RtcTime::from_registers(regs);
        tracing::trace!(time = %t, "rtc read");
        Ok(t)
    }

    fn set_time(&mut self, time: &RtcTime) -> Result<(), BoxError> {
        self.write_registers(time.to_registers())
            .map_err(HwError::from)?;
        tracing::debug!(time = %time, "rtc set");
        Ok(())
    }
}
