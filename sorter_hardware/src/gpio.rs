//! Raspberry Pi GPIO backends (rppal).
use rppal::gpio::{Gpio, InputPin, IoPin, Level, Mode, Trigger};
use sorter_traits::{BoxError, IrqFlags, Keypad, Motor, OutputPin};

use crate::error::{HwError, Result};
use crate::i2c::BusLines;
use crate::timer::IrqSender;

fn gpio() -> Result<Gpio> {
    Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))
}

fn pin(gpio: &Gpio, n: u8) -> Result<rppal::gpio::Pin> {
    gpio.get(n)
        .map_err(|e| HwError::Gpio(format!("pin {n}: {e}")))
}

/// Open-drain emulation: a released line is an input (external pull-up), a
/// driven line is an output held low.
pub struct RppalBusLines {
    scl: IoPin,
    sda: IoPin,
}

impl RppalBusLines {
    pub fn new(scl_pin: u8, sda_pin: u8) -> Result<Self> {
        let gpio = gpio()?;
        let mut scl = pin(&gpio, scl_pin)?.into_io(Mode::Input);
        let mut sda = pin(&gpio, sda_pin)?.into_io(Mode::Input);
        scl.set_low();
        sda.set_low();
        Ok(Self { scl, sda })
    }
}

impl BusLines for RppalBusLines {
    fn release_scl(&mut self) {
        self.scl.set_mode(Mode::Input);
    }
    fn drive_scl_low(&mut self) {
        self.scl.set_mode(Mode::Output);
        self.scl.set_low();
    }
    fn release_sda(&mut self) {
        self.sda.set_mode(Mode::Input);
    }
    fn drive_sda_low(&mut self) {
        self.sda.set_mode(Mode::Output);
        self.sda.set_low();
    }
    fn scl_is_high(&mut self) -> bool {
        self.scl.is_high()
    }
    fn sda_is_high(&mut self) -> bool {
        self.sda.is_high()
    }
}

pub struct HardwarePin {
    pin: rppal::gpio::OutputPin,
}

impl HardwarePin {
    pub fn new(n: u8) -> Result<Self> {
        let mut pin = pin(&gpio()?, n)?.into_output();
        pin.set_low();
        Ok(Self { pin })
    }
}

impl OutputPin for HardwarePin {
    fn set_high(&mut self) {
        self.pin.set_high();
    }
    fn set_low(&mut self) {
        self.pin.set_low();
    }
    fn is_set_high(&self) -> bool {
        self.pin.is_set_high()
    }
}

/// Fixture motor on a single enable line.
pub struct HardwareMotor {
    enable: HardwarePin,
}

impl HardwareMotor {
    pub fn new(n: u8) -> Result<Self> {
        Ok(Self {
            enable: HardwarePin::new(n)?,
        })
    }
}

impl Motor for HardwareMotor {
    fn start(&mut self) -> std::result::Result<(), BoxError> {
        self.enable.set_high();
        tracing::debug!("motor started");
        Ok(())
    }
    fn stop(&mut self) -> std::result::Result<(), BoxError> {
        self.enable.set_low();
        tracing::debug!("motor stopped");
        Ok(())
    }
}

/// 16-key encoder: four data lines plus a data-available line whose rising
/// edge raises the keypad interrupt.
pub struct EncoderKeypad {
    data: [InputPin; 4],
    _data_available: InputPin,
}

impl EncoderKeypad {
    pub fn new(data_pins: [u8; 4], da_pin: u8, irq: IrqSender) -> Result<Self> {
        let gpio = gpio()?;
        let mut data = Vec::with_capacity(4);
        for n in data_pins {
            data.push(pin(&gpio, n)?.into_input());
        }
        let data: [InputPin; 4] = data
            .try_into()
            .map_err(|_| HwError::Gpio("keypad data pins".into()))?;
        let mut da = pin(&gpio, da_pin)?.into_input();
        da.set_async_interrupt(Trigger::RisingEdge, move |_level: Level| {
            let _ = irq.send(IrqFlags::KEYPAD);
        })
        .map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(Self {
            data,
            _data_available: da,
        })
    }
}

impl Keypad for EncoderKeypad {
    fn read_port(&mut self) -> u8 {
        let code = self
            .data
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, p)| acc | (u8::from(p.is_high()) << i));
        code << 4
    }
}
