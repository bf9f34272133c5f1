//! Hardware assembly: simulated backends by default, the board's drivers with
//! the `hardware` feature.

use std::time::Duration;

use eyre::WrapErr;
use sorter_config::Config;
use sorter_core::{Gate, Machine};
use sorter_hardware::{
    BufferedDisplay, ConsoleDisplay, IrqReceiver, IrqSender, KeypadHandle, MemoryStore,
    SoftTimer, irq_line,
};
use sorter_traits::{ByteStore, ColorSensor, Display, IrqFlags, RealTimeClock};

/// A ready machine plus the interrupt line it is serviced from.
pub struct Assembled {
    pub machine: Machine,
    pub irq: IrqReceiver,
    /// Present only with the simulated keypad.
    pub keys: Option<KeypadHandle>,
}

fn servo_period(cfg: &Config) -> Duration {
    Duration::from_micros(u64::from(cfg.servo.period_us))
}

fn open_store(cfg: &Config) -> eyre::Result<Box<dyn ByteStore>> {
    Ok(match &cfg.storage.path {
        Some(path) => Box::new(
            sorter_hardware::FileStore::open(path, cfg.storage.size)
                .wrap_err_with(|| format!("open byte store {path}"))?,
        ),
        None => Box::new(MemoryStore::new(cfg.storage.size)),
    })
}

fn display(quiet: bool) -> Box<dyn Display> {
    if quiet {
        Box::new(BufferedDisplay::new())
    } else {
        Box::new(ConsoleDisplay::new())
    }
}

fn timers(tx: &IrqSender, cfg: &Config) -> [SoftTimer; 3] {
    let period = servo_period(cfg);
    [
        SoftTimer::spawn("gate0", IrqFlags::GATE0_TIMER, tx.clone(), period),
        SoftTimer::spawn("gate1", IrqFlags::GATE1_TIMER, tx.clone(), period),
        SoftTimer::spawn(
            "operation",
            IrqFlags::OP_TIMEOUT,
            tx.clone(),
            Duration::from_secs(cfg.timing.operation_timeout_s),
        ),
    ]
}

#[cfg(not(feature = "hardware"))]
pub fn assemble(cfg: &Config, quiet: bool) -> eyre::Result<Assembled> {
    use sorter_hardware::{
        LatchedKeypad, SimPin, SimulatedColorSensor, SimulatedMotor, SimulatedRtc,
    };
    use sorter_traits::{MonotonicClock, RtcTime};

    let (tx, irq) = irq_line();
    let (keypad, keys) = LatchedKeypad::new(tx.clone());
    let [t0, t1, op] = timers(&tx, cfg);
    let rtc = SimulatedRtc::new(
        MonotonicClock::new(),
        RtcTime::from_registers(crate::cli::DEFAULT_CLOCK),
    );

    let machine = Machine::builder()
        .with_color_sensor(SimulatedColorSensor::new(cfg.sim.gap_samples))
        .with_rtc(rtc)
        .with_motor(SimulatedMotor::new())
        .with_gate(Gate::Gate0, SimPin::new(), t0)
        .with_gate(Gate::Gate1, SimPin::new(), t1)
        .with_operation_timer(op)
        .with_keypad(keypad)
        .with_display(display(quiet))
        .with_store(open_store(cfg)?)
        .with_config(cfg)
        .build()?;
    tracing::info!(backend = "sim", "machine assembled");
    Ok(Assembled {
        machine,
        irq,
        keys: Some(keys),
    })
}

#[cfg(feature = "hardware")]
type Bus = sorter_hardware::SharedBus<
    sorter_hardware::BitBangI2c<sorter_hardware::gpio::RppalBusLines, sorter_traits::MonotonicClock>,
>;

#[cfg(feature = "hardware")]
fn bus(cfg: &Config) -> eyre::Result<Bus> {
    use sorter_hardware::{BitBangI2c, BusTiming, SharedBus, gpio::RppalBusLines};
    let lines = RppalBusLines::new(cfg.pins.scl, cfg.pins.sda).wrap_err("open bus pins")?;
    let timing = BusTiming {
        half_period: Duration::from_micros(cfg.bus.half_period_us),
        stretch_timeout: Duration::from_millis(cfg.bus.stretch_timeout_ms),
    };
    Ok(SharedBus::new(BitBangI2c::new(
        lines,
        sorter_traits::MonotonicClock::new(),
        timing,
    )))
}

#[cfg(feature = "hardware")]
pub fn assemble(cfg: &Config, quiet: bool) -> eyre::Result<Assembled> {
    use sorter_hardware::gpio::{EncoderKeypad, HardwareMotor, HardwarePin};
    use sorter_hardware::{Ds1307, Tcs3472};

    let (tx, irq) = irq_line();
    let bus = bus(cfg)?;
    let mut sensor = Tcs3472::new(bus.clone());
    sensor.init().wrap_err("init color sensor")?;
    let rtc = Ds1307::new(bus);
    let [t0, t1, op] = timers(&tx, cfg);
    let p = &cfg.pins;

    let machine = Machine::builder()
        .with_color_sensor(sensor)
        .with_rtc(rtc)
        .with_motor(HardwareMotor::new(p.motor_en).wrap_err("open motor pin")?)
        .with_gate(Gate::Gate0, HardwarePin::new(p.gate0).wrap_err("open gate pins")?, t0)
        .with_gate(Gate::Gate1, HardwarePin::new(p.gate1).wrap_err("open gate pins")?, t1)
        .with_operation_timer(op)
        .with_keypad(EncoderKeypad::new(p.key_data, p.key_da, tx).wrap_err("open keypad pins")?)
        .with_display(display(quiet))
        .with_store(open_store(cfg)?)
        .with_config(cfg)
        .build()?;
    tracing::info!(backend = "hardware", "machine assembled");
    Ok(Assembled {
        machine,
        irq,
        keys: None,
    })
}

/// The real-time clock alone, for `set-clock`.
#[cfg(not(feature = "hardware"))]
pub fn rtc(_cfg: &Config) -> eyre::Result<Box<dyn RealTimeClock>> {
    use sorter_traits::{MonotonicClock, RtcTime};
    Ok(Box::new(sorter_hardware::SimulatedRtc::new(
        MonotonicClock::new(),
        RtcTime::from_registers(crate::cli::DEFAULT_CLOCK),
    )))
}

#[cfg(feature = "hardware")]
pub fn rtc(cfg: &Config) -> eyre::Result<Box<dyn RealTimeClock>> {
    Ok(Box::new(sorter_hardware::Ds1307::new(bus(cfg)?)))
}

/// A standalone color sensor, for `self-check`.
#[cfg(not(feature = "hardware"))]
pub fn color_sensor(cfg: &Config) -> eyre::Result<Box<dyn ColorSensor>> {
    Ok(Box::new(sorter_hardware::SimulatedColorSensor::new(
        cfg.sim.gap_samples,
    )))
}

#[cfg(feature = "hardware")]
pub fn color_sensor(cfg: &Config) -> eyre::Result<Box<dyn ColorSensor>> {
    let mut sensor = sorter_hardware::Tcs3472::new(bus(cfg)?);
    sensor.init().wrap_err("init color sensor")?;
    Ok(Box::new(sensor))
}
