//! Human-readable error descriptions and structured JSON error formatting.

use sorter_core::error::{BuildError, Fault, HaltReason, SorterError};

/// Stable machine-readable name for a halt.
pub fn halt_reason_name(r: &HaltReason) -> &'static str {
    match r {
        HaltReason::EmergencyStop => "EmergencyStop",
        HaltReason::Fault(Fault::UnexpectedInterrupt { .. }) => "UnexpectedInterrupt",
        HaltReason::Fault(Fault::Bus(_)) => "BusFault",
        HaltReason::Fault(Fault::Hardware(_)) => "HardwareFault",
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingComponent(what) => format!(
                "What happened: No {what} was provided to the sorter.\nLikely causes: The peripheral failed to initialize or was not wired into the builder.\nHow to fix: Check the [pins] section and the startup log for the failing device."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/sorter_config.toml for a sample."
            ),
        };
    }

    if let Some(SorterError::Halted(reason)) = err.downcast_ref::<SorterError>() {
        return match reason {
            HaltReason::EmergencyStop => "What happened: Emergency stop was triggered.\nLikely causes: The * key was pressed.\nHow to fix: Clear the belt, then reset the controller to resume.".to_string(),
            HaltReason::Fault(Fault::UnexpectedInterrupt { bits }) => format!(
                "What happened: An interrupt fired that no handler owns (flags {bits:#04x}).\nLikely causes: Electrical noise on an interrupt line or a misconfigured timer.\nHow to fix: Check wiring and grounding, then reset the controller."
            ),
            HaltReason::Fault(Fault::Bus(detail)) => format!(
                "What happened: The sensor bus stopped responding ({detail}).\nLikely causes: A device holding SCL/SDA low, missing pull-ups, or loose wiring.\nHow to fix: Check the color sensor and clock wiring and pull-ups; raise bus.stretch_timeout_ms if the devices are slow, then reset."
            ),
            HaltReason::Fault(Fault::Hardware(detail)) => format!(
                "What happened: A peripheral failed ({detail}).\nLikely causes: GPIO permissions or a disconnected device.\nHow to fix: Re-run with --log-level=debug for details, then reset."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<SorterError>() {
        return format!(
            "What happened: {se}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("bus stuck") || lower.contains("init color sensor") {
        return "What happened: A bus device did not answer during startup.\nLikely causes: Wrong SCL/SDA pins, missing pull-ups, or the device is unpowered.\nHow to fix: Check [pins] scl/sda in the config and the sensor wiring.".to_string();
    }

    if lower.contains("open") && lower.contains("pin") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    // Sample trace header special-case
    if lower.contains("sample trace csv must have headers") {
        return "Invalid headers in sample trace CSV. Expected 'clear,red,green,blue'.".to_string();
    }

    if lower.contains("invalid configuration") || lower.contains(" must ") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range or inconsistent values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Map a halt (if present) to stable exit codes; other errors return 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(SorterError::Halted(reason)) = err.downcast_ref::<SorterError>() {
        return match reason {
            HaltReason::EmergencyStop => 2,
            HaltReason::Fault(Fault::UnexpectedInterrupt { .. }) => 3,
            HaltReason::Fault(Fault::Bus(_)) => 4,
            HaltReason::Fault(Fault::Hardware(_)) => 5,
        };
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    if let Some(SorterError::Halted(reason)) = err.downcast_ref::<SorterError>() {
        return json!({ "reason": halt_reason_name(reason), "message": humanize(err) }).to_string();
    }

    // Generic error JSON
    json!({ "reason": "Error", "message": humanize(err) }).to_string()
}
