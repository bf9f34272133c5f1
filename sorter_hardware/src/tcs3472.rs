//! TCS3472-style color sensor on the shared bus.
//!
//! `init()` powers the sensor up, enables the ADC and leaves the register
//! pointer on the clear-channel low byte with auto-increment, so every later
//! `read_colors()` is a bare addressed read of eight bytes.
use sorter_traits::{BoxError, ColorSample, ColorSensor};

use crate::error::{BusError, HwError};
use crate::i2c::{I2cMaster, SharedBus, read_addr, write_addr};

pub const TCS3472_ADDR: u8 = 0x29;

const CMD: u8 = 0x80;
const CMD_AUTO_INCREMENT: u8 = 0x20;
const REG_ENABLE: u8 = 0x00;
const REG_CDATAL: u8 = 0x14;
/// PON | AEN
const ENABLE_PON_AEN: u8 = 0x03;

pub struct Tcs3472<B: I2cMaster> {
    bus: SharedBus<B>,
    addr: u8,
}

impl<B: I2cMaster> Tcs3472<B> {
    pub fn new(bus: SharedBus<B>) -> Self {
        Self {
            bus,
            addr: TCS3472_ADDR,
        }
    }

    pub fn init(&mut self) -> Result<(), HwError> {
        self.bus.transaction(|bus| {
            bus.start()?;
            bus.write(write_addr(self.addr))?;
            bus.write(CMD | REG_ENABLE)?;
            bus.write(ENABLE_PON_AEN)?;
            bus.stop()?;

            bus.start()?;
            bus.write(write_addr(self.addr))?;
            bus.write(CMD | CMD_AUTO_INCREMENT | REG_CDATAL)?;
            bus.stop()
        })?;
        tracing::debug!("color sensor initialized");
        Ok(())
    }

    fn read_raw(&self) -> Result<[u8; 8], BusError> {
        self.bus.transaction(|bus| {
            bus.start()?;
            bus.write(read_addr(self.addr))?;
            let mut raw = [0u8; 8];
            for (i, b) in raw.iter_mut().enumerate() {
                *b = bus.read(i < 7)?;
            }
            bus.stop()?;
            Ok(raw)
        })
    }
}

/// Decode clear, red, green, blue from their little-endian register pairs.
pub fn decode_channels(raw: [u8; 8]) -> ColorSample {
    let ch = |i: usize| u16::from_le_bytes([raw[i], raw[i + 1]]);
    ColorSample::new(ch(0), ch(2), ch(4), ch(6))
}

impl<B: I2cMaster> ColorSensor for Tcs3472<B> {
    fn read_colors(&mut self) -> Result<ColorSample, BoxError> {
        let raw = self.read_raw().map_err(HwError::from)?;
        let s = decode_channels(raw);
        tracing::trace!(
            clear = s.clear,
            red = s.red,
            green = s.green,
            blue = s.blue,
            "color sample"
        );
        Ok(s)
    }
}
