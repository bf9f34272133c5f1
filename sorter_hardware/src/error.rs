use thiserror::Error;

/// Which bus line a timeout was observed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Scl,
    Sda,
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Line::Scl => f.write_str("SCL"),
            Line::Sda => f.write_str("SDA"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("bus stuck: {line} held low past timeout")]
    Stuck { line: Line },
    #[error("bus busy: transaction already in progress")]
    Busy,
}

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
    #[error("store address {0:#06x} out of range")]
    StoreRange(u16),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
