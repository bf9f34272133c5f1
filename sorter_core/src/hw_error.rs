//! Maps `Box<dyn Error>` from trait boundaries to typed `SorterError`.
//!
//! The traits in `sorter_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `sorter_hardware::HwError` downcasting.

use crate::error::SorterError;

/// Map a trait-boundary error to a typed `SorterError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> SorterError {
    #[cfg(feature = "hardware-errors")]
    {
        use sorter_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Bus(b) => SorterError::Bus(b.to_string()),
                other => SorterError::HardwareFault(other.to_string()),
            };
        }
        if let Some(b) = e.downcast_ref::<sorter_hardware::error::BusError>() {
            return SorterError::Bus(b.to_string());
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("bus") || lower.contains("stuck") {
        SorterError::Bus(s)
    } else {
        SorterError::Hardware(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_errors_fall_back_to_text() {
        let e = std::io::Error::other("i2c bus stuck");
        assert!(matches!(map_hw_error(&e), SorterError::Bus(_)));
        let e = std::io::Error::other("gpio gone");
        assert!(matches!(map_hw_error(&e), SorterError::Hardware(_)));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn hw_bus_error_maps_to_bus() {
        use sorter_hardware::error::{BusError, HwError, Line};
        let e = HwError::Bus(BusError::Stuck { line: Line::Sda });
        match map_hw_error(&e) {
            SorterError::Bus(s) => assert!(s.contains("SDA")),
            other => panic!("expected Bus, got {other:?}"),
        }
        let e = HwError::StoreRange(0x300);
        assert!(matches!(map_hw_error(&e), SorterError::HardwareFault(_)));
    }
}
