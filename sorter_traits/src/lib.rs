pub mod clock;
pub mod types;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use types::{ColorSample, IrqFlags, KEY_MAP, RtcTime, code_for_key, key_for_code};

/// Error type carried across the hardware trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Four-channel color sensor read once per classification tick.
pub trait ColorSensor {
    fn read_colors(&mut self) -> Result<ColorSample, BoxError>;
}

/// Battery-backed real-time clock holding BCD registers.
pub trait RealTimeClock {
    fn read_time(&mut self) -> Result<RtcTime, BoxError>;
    fn set_time(&mut self, time: &RtcTime) -> Result<(), BoxError>;
}

/// Fixture motor (level-driven enable line).
pub trait Motor {
    fn start(&mut self) -> Result<(), BoxError>;
    fn stop(&mut self) -> Result<(), BoxError>;
}

/// Push-pull digital output, e.g. a servo signal line.
pub trait OutputPin {
    fn set_high(&mut self);
    fn set_low(&mut self);
    fn is_set_high(&self) -> bool;
}

/// One-shot reloadable hardware timer that raises its interrupt flag on overflow.
///
/// After an overflow the timer keeps running with the last loaded period until
/// `reload` is called again or it is disabled.
pub trait HwTimer {
    fn enable(&mut self);
    fn disable(&mut self);
    fn reload(&mut self, period: std::time::Duration);
    fn is_enabled(&self) -> bool;
}

/// Pre-decoded keypad port. The key code sits in the upper nibble.
pub trait Keypad {
    fn read_port(&mut self) -> u8;
}

/// Two-line character display addressed by cursor moves.
pub trait Display {
    fn home(&mut self);
    fn newline(&mut self);
    fn write_str(&mut self, text: &str);
}

/// Byte-addressed non-volatile store (EEPROM-style).
///
/// Backends may buffer `write`s; `flush` makes them durable.
pub trait ByteStore {
    fn read(&mut self, addr: u16) -> Result<u8, BoxError>;
    fn write(&mut self, addr: u16, value: u8) -> Result<(), BoxError>;
    fn flush(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

impl<T: ByteStore + ?Sized> ByteStore for Box<T> {
    fn read(&mut self, addr: u16) -> Result<u8, BoxError> {
        (**self).read(addr)
    }
    fn write(&mut self, addr: u16, value: u8) -> Result<(), BoxError> {
        (**self).write(addr, value)
    }
    fn flush(&mut self) -> Result<(), BoxError> {
        (**self).flush()
    }
}

impl<T: Display + ?Sized> Display for Box<T> {
    fn home(&mut self) {
        (**self).home();
    }
    fn newline(&mut self) {
        (**self).newline();
    }
    fn write_str(&mut self, text: &str) {
        (**self).write_str(text);
    }
}
