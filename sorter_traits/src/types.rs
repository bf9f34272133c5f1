//! Value types shared across the hardware boundary.

use std::fmt;

/// One color-sensor reading, one 16-bit intensity per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorSample {
    pub clear: u16,
    pub red: u16,
    pub green: u16,
    pub blue: u16,
}

impl ColorSample {
    pub const fn new(clear: u16, red: u16, green: u16, blue: u16) -> Self {
        Self {
            clear,
            red,
            green,
            blue,
        }
    }

    /// Red over blue. A zero blue channel yields `f32::INFINITY` when red is
    /// non-zero and 1.0 when both are zero.
    pub fn red_blue_ratio(&self) -> f32 {
        match (self.red, self.blue) {
            (0, 0) => 1.0,
            (_, 0) => f32::INFINITY,
            (r, b) => f32::from(r) / f32::from(b),
        }
    }
}

/// Raw register image of the real-time clock. Every field is packed BCD,
/// exactly as the chip stores it; `hours` is in 24-hour mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RtcTime {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub weekday: u8,
    pub day: u8,
    pub month: u8,
    pub year: u8,
}

impl RtcTime {
    /// Register order used on the wire: seconds first, year last.
    pub fn from_registers(r: [u8; 7]) -> Self {
        Self {
            seconds: r[0],
            minutes: r[1],
            hours: r[2],
            weekday: r[3],
            day: r[4],
            month: r[5],
            year: r[6],
        }
    }

    pub fn to_registers(&self) -> [u8; 7] {
        [
            self.seconds,
            self.minutes,
            self.hours,
            self.weekday,
            self.day,
            self.month,
            self.year,
        ]
    }

    /// Seconds since midnight. The clock-halt bit (bit 7 of seconds) is ignored.
    pub fn seconds_since_midnight(&self) -> u32 {
        let s = u32::from(bcd_to_bin(self.seconds & 0x7F));
        let m = u32::from(bcd_to_bin(self.minutes));
        let h = u32::from(bcd_to_bin(self.hours & 0x3F));
        h * 3600 + m * 60 + s
    }
}

impl fmt::Display for RtcTime {
    /// `YY/MM/DD HH:MM:SS`, printing the BCD nibbles directly.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}/{:02x}/{:02x} {:02x}:{:02x}:{:02x}",
            self.year, self.month, self.day, self.hours, self.minutes, self.seconds
        )
    }
}

/// Keypad encoder code (0..=15) to key legend, row-major.
pub const KEY_MAP: &[u8; 16] = b"123A456B789C*0#D";

/// Legend of a 4-bit key code; only the low nibble is used.
#[inline]
pub fn key_for_code(code: u8) -> char {
    char::from(KEY_MAP[usize::from(code & 0x0F)])
}

/// Encoder code that produces `key`, if it is on the keypad.
pub fn code_for_key(key: char) -> Option<u8> {
    KEY_MAP
        .iter()
        .position(|&k| char::from(k) == key)
        .map(|i| i as u8)
}

#[inline]
pub fn bcd_to_bin(v: u8) -> u8 {
    (v >> 4) * 10 + (v & 0x0F)
}

#[inline]
pub fn bin_to_bcd(v: u8) -> u8 {
    ((v / 10) << 4) | (v % 10)
}

/// Pending interrupt-flag register.
///
/// Each hardware source owns one bit. Bits outside the known set may still be
/// raised by a misbehaving source; dispatch treats them as fatal.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IrqFlags(u8);

impl IrqFlags {
    pub const KEYPAD: Self = Self(1 << 0);
    pub const GATE0_TIMER: Self = Self(1 << 1);
    pub const GATE1_TIMER: Self = Self(1 << 2);
    pub const OP_TIMEOUT: Self = Self(1 << 3);

    /// Known sources in dispatch priority order.
    pub const PRIORITY: [Self; 4] = [
        Self::KEYPAD,
        Self::GATE0_TIMER,
        Self::GATE1_TIMER,
        Self::OP_TIMEOUT,
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits_retain(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Bits that belong to no known source.
    pub const fn unknown(self) -> Self {
        let known = Self::KEYPAD.0 | Self::GATE0_TIMER.0 | Self::GATE1_TIMER.0 | Self::OP_TIMEOUT.0;
        Self(self.0 & !known)
    }
}

impl std::ops::BitOr for IrqFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for IrqFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IrqFlags({:#06b})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bcd_conversions() {
        assert_eq!(bcd_to_bin(0x59), 59);
        assert_eq!(bin_to_bcd(47), 0x47);
    }

    #[test]
    fn seconds_since_midnight_decodes_bcd_and_masks_halt_bit() {
        let t = RtcTime {
            seconds: 0x80 | 0x50,
            minutes: 0x35,
            hours: 0x21,
            ..RtcTime::default()
        };
        assert_eq!(t.seconds_since_midnight(), 21 * 3600 + 35 * 60 + 50);
    }

    #[test]
    fn ratio_handles_zero_blue() {
        assert_eq!(ColorSample::new(0, 0, 0, 0).red_blue_ratio(), 1.0);
        assert!(ColorSample::new(0, 5, 0, 0).red_blue_ratio().is_infinite());
        assert_eq!(ColorSample::new(0, 40, 0, 10).red_blue_ratio(), 4.0);
    }

    #[test]
    fn key_codes_round_trip_through_legend() {
        assert_eq!(key_for_code(0), '1');
        assert_eq!(key_for_code(3), 'A');
        assert_eq!(key_for_code(12), '*');
        assert_eq!(key_for_code(14), '#');
        assert_eq!(code_for_key('#'), Some(14));
        assert_eq!(code_for_key('x'), None);
    }

    #[test]
    fn irq_flags_unknown_bits() {
        let f = IrqFlags::KEYPAD | IrqFlags::from_bits_retain(0x40);
        assert!(f.contains(IrqFlags::KEYPAD));
        assert_eq!(f.unknown().bits(), 0x40);
    }
}
