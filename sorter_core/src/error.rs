use thiserror::Error;

/// Unrecoverable condition that halts the machine until reset.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Pending interrupt bits that belong to no known source.
    #[error("unexpected interrupt (flags {bits:#010b})")]
    UnexpectedInterrupt { bits: u8 },
    /// A bus line stayed low past the stretch timeout.
    #[error("bus fault: {0}")]
    Bus(String),
    /// Any other peripheral failure.
    #[error("hardware fault: {0}")]
    Hardware(String),
}

impl Fault {
    /// First display line of the halt screen.
    pub fn headline(&self) -> &'static str {
        match self {
            Fault::UnexpectedInterrupt { .. } => "bad interrupt",
            Fault::Bus(_) => "bus fault",
            Fault::Hardware(_) => "hardware fault",
        }
    }

    /// Second display line of the halt screen.
    pub fn detail(&self) -> String {
        match self {
            Fault::UnexpectedInterrupt { bits } => format!("flags {bits:#04x}"),
            Fault::Bus(s) | Fault::Hardware(s) => s.clone(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HaltReason {
    #[error("emergency stop")]
    EmergencyStop,
    #[error(transparent)]
    Fault(#[from] Fault),
}

#[derive(Debug, Error, Clone)]
pub enum SorterError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("bus error: {0}")]
    Bus(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("halted: {0}")]
    Halted(HaltReason),
}

impl SorterError {
    /// Fault a peripheral error escalates to. Every hardware error is fatal.
    pub fn into_fault(self) -> Fault {
        match self {
            SorterError::Bus(s) => Fault::Bus(s),
            SorterError::Halted(HaltReason::Fault(f)) => f,
            other => Fault::Hardware(other.to_string()),
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing {0}")]
    MissingComponent(&'static str),
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
