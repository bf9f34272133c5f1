#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core sorting logic (hardware-agnostic).
//!
//! All hardware access goes through the `sorter_traits` peripheral traits, so
//! the same `Machine` runs against the board drivers in `sorter_hardware` or
//! against its simulated backends.
//!
//! ## Architecture
//!
//! - **Classification**: pass framing and band reads (`classifier`)
//! - **Gates**: software PWM for the two servos (`servo`)
//! - **States**: keypad transition table (`state`)
//! - **Interrupts**: pending latch, priority dispatch, global mask (`irq`)
//! - **Persistence**: per-bin counters in byte storage (`counters`)
//! - **Machine**: one owned value holding peripherals and shared state
//!   (`machine`), assembled by a type-state builder (`builder`)
//! - **Runner**: host main loop (`runner`)
//! - **Replay**: offline classification of recorded traces (`replay`)

pub mod builder;
pub mod classifier;
pub mod config;
pub mod conversions;
pub mod counters;
pub mod error;
pub mod hw_error;
pub mod irq;
pub mod machine;
pub mod replay;
pub mod runner;
pub mod servo;
pub mod state;
pub mod util;

pub use builder::{MachineBuilder, Missing, Set};
pub use classifier::{BandRead, Category, Classifier, PassContext};
pub use config::{ClassifierCfg, Gate, GateCommand, RoutingCfg, ServoCfg, TimingCfg};
pub use conversions::sample_from_row;
pub use counters::{Bin, BinCounters};
pub use error::{BuildError, Fault, HaltReason, Report, Result, SorterError};
pub use irq::{InterruptMask, IrqMask, IrqSource};
pub use machine::{Machine, TickOutcome};
pub use replay::{Commit, ReplayReport, replay};
pub use runner::{RunReport, Runner};
pub use servo::{ServoOutput, ServoPwm, ServoTiming};
pub use state::{Command, OperatingState};
