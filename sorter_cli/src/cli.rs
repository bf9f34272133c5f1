//! CLI argument definitions and shared statics.

use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

use sorter_traits::RtcTime;
use sorter_traits::types::bin_to_bcd;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Registers written by `set-clock --default`: 21:35:50 on 17-02-05.
pub const DEFAULT_CLOCK: [u8; 7] = [0x50, 0x35, 0x21, 0x08, 0x05, 0x02, 0x17];

#[derive(Parser, Debug)]
#[command(name = "sorter", version, about = "Bottle sorter CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/sorter_config.toml")]
    pub config: PathBuf,

    /// Log and report as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the sorter until Ctrl-C (or --max-ticks)
    Run {
        /// Stop after this many main-loop ticks
        #[arg(long, value_name = "N")]
        max_ticks: Option<u64>,
        /// Keys to press on the simulated keypad, in order (e.g. "1" to start a run)
        #[arg(long, value_name = "KEYS")]
        keys: Option<String>,
        /// Read simulated key presses from stdin, one or more keys per line
        #[arg(long, action = ArgAction::SetTrue)]
        stdin_keys: bool,
    },
    /// Classify a recorded sample trace (CSV: clear,red,green,blue) offline
    Replay {
        #[arg(long, value_name = "FILE")]
        trace: PathBuf,
    },
    /// Write the real-time clock registers
    #[command(group(ArgGroup::new("when").required(true).args(["at", "default"])))]
    SetClock {
        /// Time to set, as "YY-MM-DD HH:MM:SS"
        #[arg(long, value_name = "TIME", value_parser = parse_clock)]
        at: Option<RtcTime>,
        /// Write the factory default registers
        #[arg(long, action = ArgAction::SetTrue)]
        default: bool,
    },
    /// Quick health check (bus devices present / sim ok)
    SelfCheck,
}

/// Parse "YY-MM-DD HH:MM:SS" into chip registers.
pub fn parse_clock(s: &str) -> Result<RtcTime, String> {
    let bad = || format!("expected \"YY-MM-DD HH:MM:SS\", got {s:?}");
    let (date, time) = s.trim().split_once(' ').ok_or_else(bad)?;
    let field = |part: Option<&str>, max: u8, min: u8| -> Result<u8, String> {
        let v: u8 = part.ok_or_else(bad)?.trim().parse().map_err(|_| bad())?;
        if v < min || v > max {
            return Err(bad());
        }
        Ok(v)
    };
    let mut d = date.split('-');
    let (year, month, day) = (
        field(d.next(), 99, 0)?,
        field(d.next(), 12, 1)?,
        field(d.next(), 31, 1)?,
    );
    let mut t = time.split(':');
    let (hours, minutes, seconds) = (
        field(t.next(), 23, 0)?,
        field(t.next(), 59, 0)?,
        field(t.next(), 59, 0)?,
    );
    if d.next().is_some() || t.next().is_some() {
        return Err(bad());
    }
    Ok(RtcTime {
        seconds: bin_to_bcd(seconds),
        minutes: bin_to_bcd(minutes),
        hours: bin_to_bcd(hours),
        weekday: weekday(2000 + u32::from(year), month, day),
        day: bin_to_bcd(day),
        month: bin_to_bcd(month),
        year: bin_to_bcd(year),
    })
}

/// Day of week, 1 = Sunday.
fn weekday(year: u32, month: u8, day: u8) -> u8 {
    const T: [u32; 12] = [0, 3, 2, 5, 0, 3, 5, 1, 4, 6, 2, 4];
    let y = if month < 3 { year - 1 } else { year };
    let w = (y + y / 4 - y / 100 + y / 400 + T[usize::from(month - 1)] + u32::from(day)) % 7;
    (w as u8) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clock_into_bcd_registers() {
        let t = parse_clock("24-06-15 12:01:59").unwrap();
        assert_eq!(t.to_registers(), [0x59, 0x01, 0x12, 7, 0x15, 0x06, 0x24]);
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(parse_clock("24-13-01 00:00:00").is_err());
        assert!(parse_clock("24-01-01 24:00:00").is_err());
        assert!(parse_clock("24-01-01").is_err());
        assert!(parse_clock("24-01-01 00:00:00:00").is_err());
    }
}
