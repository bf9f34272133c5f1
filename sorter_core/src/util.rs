//! Small time and display helpers for sorter_core.

/// Seconds in one day.
pub const SECS_PER_DAY: u32 = 86_400;

/// Display width in characters.
pub const LINE_WIDTH: usize = 16;

/// Seconds from `start` to `end`, both seconds since midnight.
/// An `end` earlier than `start` is taken to be on the next day.
#[inline]
pub fn elapsed_secs(start: u32, end: u32) -> u32 {
    if end >= start {
        end - start
    } else {
        end + SECS_PER_DAY - start
    }
}

/// Clip or blank-pad `text` to exactly one display line.
pub fn pad_line(text: &str) -> String {
    let mut s: String = text.chars().take(LINE_WIDTH).collect();
    let n = s.chars().count();
    s.extend(std::iter::repeat_n(' ', LINE_WIDTH - n));
    s
}
