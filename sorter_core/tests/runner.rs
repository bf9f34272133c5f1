use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sorter_core::{Gate, HaltReason, Machine, OperatingState, Runner, SorterError, TimingCfg};
use sorter_hardware::{
    BufferedDisplay, KeypadHandle, LatchedKeypad, MemoryStore, SimPin, SimulatedColorSensor,
    SimulatedMotor, SimulatedRtc, SoftTimer, irq_line,
};
use sorter_traits::{IrqFlags, MonotonicClock, RtcTime};

const SERVO_PERIOD: Duration = Duration::from_millis(20);

fn runner(op_timeout: Duration) -> (Runner, KeypadHandle, SimulatedMotor) {
    let (tx, rx) = irq_line();
    let (keypad, keys) = LatchedKeypad::new(tx.clone());
    let motor = SimulatedMotor::new();
    let timing = TimingCfg {
        tick: Duration::from_millis(1),
        key_debounce: Duration::from_millis(200),
        operation_timeout: op_timeout,
    };
    let start = RtcTime::from_registers([0x00, 0x30, 0x08, 0x01, 0x01, 0x01, 0x24]);
    let machine = Machine::builder()
        .with_color_sensor(SimulatedColorSensor::new(5))
        .with_rtc(SimulatedRtc::new(MonotonicClock::new(), start))
        .with_motor(motor.clone())
        .with_gate(
            Gate::Gate0,
            SimPin::new(),
            SoftTimer::spawn("gate0", IrqFlags::GATE0_TIMER, tx.clone(), SERVO_PERIOD),
        )
        .with_gate(
            Gate::Gate1,
            SimPin::new(),
            SoftTimer::spawn("gate1", IrqFlags::GATE1_TIMER, tx.clone(), SERVO_PERIOD),
        )
        .with_operation_timer(SoftTimer::spawn("op", IrqFlags::OP_TIMEOUT, tx, op_timeout))
        .with_keypad(keypad)
        .with_display(BufferedDisplay::new())
        .with_store(MemoryStore::new(64))
        .with_timing_cfg(timing)
        .build()
        .expect("builds");
    (Runner::new(machine, rx), keys, motor)
}

#[test]
fn stops_after_max_ticks() {
    let (r, _keys, _motor) = runner(Duration::from_secs(180));
    let mut r = r.with_max_ticks(5);
    let report = r.run().expect("clean stop");
    assert_eq!(report.ticks, 5);
    assert_eq!(report.state, OperatingState::Standby);
}

#[test]
fn shutdown_flag_stops_the_loop() {
    let (r, _keys, _motor) = runner(Duration::from_secs(180));
    let flag = Arc::new(AtomicBool::new(true));
    let mut r = r.with_shutdown(flag.clone());
    assert!(Arc::ptr_eq(&flag, &r.shutdown_handle()));
    let report = r.run().expect("clean stop");
    assert_eq!(report.ticks, 0);
    flag.store(false, Ordering::Relaxed);
}

#[test]
fn operation_timer_ends_a_run_on_its_own() {
    let (r, keys, motor) = runner(Duration::from_millis(50));
    let mut r = r.with_max_ticks(400);
    assert!(keys.press('1'));
    let report = r.run().expect("clean stop");
    assert_eq!(report.state, OperatingState::OperationEnd);
    assert!(!motor.is_running());
    assert!(!r.machine().is_run_active());
}

#[test]
fn emergency_stop_surfaces_as_halted_error() {
    let (r, keys, motor) = runner(Duration::from_secs(180));
    let mut r = r.with_max_ticks(10);
    assert!(keys.press('1'));
    assert!(keys.press('*'));
    let err = r.run().expect_err("halted");
    match err.downcast_ref::<SorterError>() {
        Some(SorterError::Halted(HaltReason::EmergencyStop)) => {}
        other => panic!("expected emergency stop, got {other:?}"),
    }
    assert!(!motor.is_running());
    assert_eq!(r.machine().state(), OperatingState::EmergencyStop);
}
