mod cli;
mod error_fmt;
mod hw;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use serde_json::json;
use sorter_config::{Config, Logging};
use sorter_core::hw_error::map_hw_error;
use sorter_core::{Bin, BinCounters, ClassifierCfg, Runner, replay, sample_from_row};
use sorter_hardware::KeypadHandle;
use sorter_traits::RtcTime;

use crate::cli::{Cli, Commands, DEFAULT_CLOCK, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&e));
        } else {
            eprintln!("error: {}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let _ = color_eyre::install();
    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), "config loaded");

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "Ctrl-C handler not installed");
        }
    }

    match cli.cmd {
        Commands::Run {
            max_ticks,
            keys,
            stdin_keys,
        } => cmd_run(&cfg, cli.json, max_ticks, keys, stdin_keys, shutdown),
        Commands::Replay { trace } => cmd_replay(&cfg, cli.json, &trace),
        Commands::SetClock { at, default: _ } => {
            cmd_set_clock(&cfg, cli.json, at.unwrap_or(RtcTime::from_registers(DEFAULT_CLOCK)))
        }
        Commands::SelfCheck => cmd_self_check(&cfg, cli.json),
    }
}

fn load_config(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg: Config = toml::from_str(&text).wrap_err("parse config TOML")?;
    cfg.validate()?;
    Ok(cfg)
}

fn init_tracing(json: bool, level: &str, logging: &Logging) -> eyre::Result<()> {
    use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let console = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let file = match &logging.file {
        Some(path) => {
            let p = Path::new(path);
            let dir = p
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = p
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {path}"))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_filter(file_filter)
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console.with_filter(filter))
        .with(file)
        .try_init()?;
    Ok(())
}

fn counters_json(c: BinCounters) -> serde_json::Value {
    let mut m = serde_json::Map::new();
    for bin in Bin::ALL {
        let key = match bin {
            Bin::Total => "total".to_string(),
            Bin::Category(cat) => cat.to_string(),
        };
        m.insert(key, json!(c.get(bin)));
    }
    serde_json::Value::Object(m)
}

fn print_counters(c: BinCounters) {
    for bin in Bin::ALL {
        println!("{:<16}{}", bin.label(), c.get(bin));
    }
}

/// Press each key of `keys` on the simulated keypad, spaced past the key debounce.
fn spawn_key_script(handle: KeypadHandle, keys: String, spacing: Duration) {
    std::thread::spawn(move || {
        for key in keys.chars().filter(|c| !c.is_whitespace()) {
            if !handle.press(key) {
                tracing::warn!(%key, "not a keypad key");
            }
            std::thread::sleep(spacing);
        }
    });
}

fn spawn_stdin_keys(handle: KeypadHandle, spacing: Duration) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            for key in line.chars().filter(|c| !c.is_whitespace()) {
                handle.press(key);
                std::thread::sleep(spacing);
            }
        }
    });
}

fn cmd_run(
    cfg: &Config,
    json: bool,
    max_ticks: Option<u64>,
    keys: Option<String>,
    stdin_keys: bool,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    let hw::Assembled {
        machine,
        irq,
        keys: handle,
    } = hw::assemble(cfg, json)?;

    let spacing = Duration::from_millis(cfg.timing.key_debounce_ms + 50);
    match handle {
        Some(h) => {
            if let Some(seq) = keys {
                spawn_key_script(h.clone(), seq, spacing);
            }
            if stdin_keys {
                spawn_stdin_keys(h, spacing);
            }
        }
        None if keys.is_some() || stdin_keys => {
            tracing::warn!("scripted keys need the simulated keypad; ignored");
        }
        None => {}
    }

    let mut runner = Runner::new(machine, irq).with_shutdown(shutdown);
    if let Some(n) = max_ticks {
        runner = runner.with_max_ticks(n);
    }
    let report = runner.run()?;

    if json {
        println!(
            "{}",
            json!({
                "ticks": report.ticks,
                "state": report.state.to_string(),
                "counters": counters_json(report.counters),
                "history": counters_json(report.history),
            })
        );
    } else {
        println!("Stopped in {} after {} ticks", report.state, report.ticks);
        print_counters(report.counters);
    }
    Ok(())
}

fn cmd_replay(cfg: &Config, json: bool, trace: &Path) -> eyre::Result<()> {
    let rows = sorter_config::load_sample_trace_csv(trace)?;
    let r = replay(&ClassifierCfg::from(cfg), rows.iter().map(sample_from_row));
    tracing::info!(
        samples = r.samples,
        total = r.counters.total(),
        open_at_end = r.open_at_end,
        "replay complete"
    );

    if json {
        let commits: Vec<_> = r
            .commits
            .iter()
            .map(|c| json!({ "index": c.index, "category": c.category.to_string() }))
            .collect();
        println!(
            "{}",
            json!({
                "samples": r.samples,
                "counters": counters_json(r.counters),
                "commits": commits,
                "open_at_end": r.open_at_end,
            })
        );
    } else {
        println!("Replayed {} samples", r.samples);
        print_counters(r.counters);
        if r.open_at_end {
            println!("(trace ended inside a pass; not counted)");
        }
    }
    Ok(())
}

fn cmd_set_clock(cfg: &Config, json: bool, time: RtcTime) -> eyre::Result<()> {
    let mut rtc = hw::rtc(cfg)?;
    rtc.set_time(&time)
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
        .wrap_err("set clock")?;
    tracing::info!(%time, "clock set");
    if json {
        println!(
            "{}",
            json!({ "clock": time.to_string(), "registers": time.to_registers() })
        );
    } else {
        println!("Clock set to {time}");
    }
    Ok(())
}

fn cmd_self_check(cfg: &Config, json: bool) -> eyre::Result<()> {
    let now = hw::rtc(cfg)?
        .read_time()
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
        .wrap_err("read clock")?;
    let sample = hw::color_sensor(cfg)?
        .read_colors()
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
        .wrap_err("read color sensor")?;
    let assembled = hw::assemble(cfg, true)?;
    let state = assembled.machine.state();
    let total = assembled.machine.counters().total();
    drop(assembled);

    if json {
        println!(
            "{}",
            json!({
                "ok": true,
                "clock": now.to_string(),
                "sample": [sample.clear, sample.red, sample.green, sample.blue],
                "state": state.to_string(),
                "total": total,
            })
        );
    } else {
        println!(
            "self-check ok: clock {now}, sample c={} r={} g={} b={}, {state}, {total} bottles on record",
            sample.clear, sample.red, sample.green, sample.blue
        );
    }
    Ok(())
}
