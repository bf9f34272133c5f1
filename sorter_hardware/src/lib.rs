pub mod ds1307;
pub mod error;
#[cfg(feature = "hardware")]
pub mod gpio;
pub mod i2c;
pub mod sim;
pub mod store;
pub mod tcs3472;
pub mod timer;
pub mod util;

pub use ds1307::Ds1307;
pub use error::{BusError, HwError};
pub use i2c::{Ack, BitBangI2c, BusLines, BusTiming, I2cMaster, SharedBus};
pub use sim::{
    BufferedDisplay, ConsoleDisplay, KeypadHandle, LatchedKeypad, MemoryStore, SimBottle, SimPin,
    SimulatedColorSensor, SimulatedMotor, SimulatedRtc,
};
pub use store::FileStore;
pub use tcs3472::Tcs3472;
pub use timer::{IrqReceiver, IrqSender, SoftTimer, irq_line};
