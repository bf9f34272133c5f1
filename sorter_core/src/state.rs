//! Operating states and the keypad transition table.
//!
//! `transition` is the pure table; the side effects that go with each edge
//! (motor, timers, timestamps, counters) are applied by `Machine`.
use std::fmt;

use sorter_traits::key_for_code;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatingState {
    Standby,
    EmergencyStop,
    Operation,
    OperationEnd,
    DateTime,
    BottleCount,
    BottleTime,
}

impl OperatingState {
    /// No key, timer or fault leaves this state; only a reset does.
    pub const fn is_terminal(self) -> bool {
        matches!(self, OperatingState::EmergencyStop)
    }
}

impl fmt::Display for OperatingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OperatingState::Standby => "standby",
            OperatingState::EmergencyStop => "emergency_stop",
            OperatingState::Operation => "operation",
            OperatingState::OperationEnd => "operation_end",
            OperatingState::DateTime => "date_time",
            OperatingState::BottleCount => "bottle_count",
            OperatingState::BottleTime => "bottle_time",
        };
        f.write_str(s)
    }
}

/// Keys with a meaning on this machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `#`
    Home,
    /// `1`
    Run,
    /// `2`
    NextPage,
    /// `3`
    RunTime,
    /// `A`
    Clock,
    /// `4`
    Stop,
    /// `*`
    EmergencyStop,
}

impl Command {
    pub fn from_key(key: char) -> Option<Self> {
        Some(match key {
            '#' => Command::Home,
            '1' => Command::Run,
            '2' => Command::NextPage,
            '3' => Command::RunTime,
            'A' => Command::Clock,
            '4' => Command::Stop,
            '*' => Command::EmergencyStop,
            _ => return None,
        })
    }
}

/// Key legend for the raw keypad port value. The code sits in the upper nibble.
pub fn decode_key(port: u8) -> char {
    key_for_code((port >> 4) & 0x0F)
}

/// Target state of a keypad command, or `None` when the key does nothing here.
pub fn transition(from: OperatingState, cmd: Command) -> Option<OperatingState> {
    use OperatingState as S;
    if from.is_terminal() {
        return None;
    }
    match (from, cmd) {
        (_, Command::Home) => Some(S::Standby),
        (S::Standby, Command::Run) => Some(S::Operation),
        (_, Command::NextPage) => Some(S::BottleCount),
        (_, Command::RunTime) => Some(S::BottleTime),
        (_, Command::Clock) => Some(S::DateTime),
        (S::Operation, Command::Stop) => Some(S::OperationEnd),
        (_, Command::EmergencyStop) => Some(S::EmergencyStop),
        _ => None,
    }
}
