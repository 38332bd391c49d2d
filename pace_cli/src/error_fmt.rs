//! Human-readable error descriptions and structured JSON error formatting.

use pace_core::error::{BuildError, PaceError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingRobot => {
                "What happened: No liquid handler backend is available.\nLikely causes: This build only drives the simulated robot and reader.\nHow to fix: Run with --simulate or --sim-deck, or wire a robot backend into the station builder.".to_string()
            }
            BuildError::MissingReader => {
                "What happened: No plate reader was provided to the station.\nLikely causes: Reader backend failed to initialize or was not wired into the builder.\nHow to fix: Pass a reader via Station::builder().reader(...).".to_string()
            }
            BuildError::MissingPumps | BuildError::MissingShaker => format!(
                "What happened: Station is incomplete ({be}).\nLikely causes: The [pumps] or [shaker] section could not be turned into a device.\nHow to fix: Check the config sections and rerun."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `pace validate`."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<PaceError>() {
        return match pe {
            PaceError::Config(msg) => format!(
                "What happened: Configuration rejected.\nDetail: {msg}\nHow to fix: Edit the config file, then rerun `pace validate`."
            ),
            PaceError::ReaderPoolExhausted { rounds } => format!(
                "What happened: All reader plates are used up after {rounds} rounds.\nLikely causes: The run outlasted experiment.reader_plates.\nHow to fix: Load fresh reader plates, raise experiment.reader_plates and restart."
            ),
            PaceError::Hardware {
                component,
                operation,
                detail,
            } => format!(
                "What happened: The {component} failed during {operation}.\nDetail: {detail}\nHow to fix: Check the device and its connection, clear the deck state by hand, then restart. The failed step was not retried."
            ),
            PaceError::TaskPanicked { task, message } => format!(
                "What happened: Background task `{task}` crashed ({message}).\nLikely causes: A bug or a device wrapper panicking.\nHow to fix: Re-run with --log-level=debug and report the log."
            ),
            PaceError::OutOfRange { .. }
            | PaceError::ChannelCount { .. }
            | PaceError::MisalignedChannels { .. } => format!(
                "What happened: {pe}.\nLikely causes: A configured volume, speed or vessel count is outside what the deck supports.\nHow to fix: Adjust the config and rerun `pace validate`."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 configuration or range, 3 hardware, 4 reader pool
/// exhausted, 5 task failure, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<PaceError>() {
        Some(
            PaceError::Config(_)
            | PaceError::OutOfRange { .. }
            | PaceError::ChannelCount { .. }
            | PaceError::MisalignedChannels { .. },
        ) => 2,
        Some(PaceError::Hardware { .. } | PaceError::Poisoned(_) | PaceError::MissingReading { .. }) => 3,
        Some(PaceError::ReaderPoolExhausted { .. }) => 4,
        Some(PaceError::TaskPanicked { .. }) => 5,
        None => 1,
    }
}

/// Stable reason name for JSON output.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<PaceError>() {
        Some(PaceError::Config(_)) => "Config",
        Some(PaceError::OutOfRange { .. }) => "OutOfRange",
        Some(PaceError::ChannelCount { .. } | PaceError::MisalignedChannels { .. }) => "Channels",
        Some(PaceError::Hardware { .. }) => "Hardware",
        Some(PaceError::Poisoned(_)) => "Poisoned",
        Some(PaceError::MissingReading { .. }) => "MissingReading",
        Some(PaceError::ReaderPoolExhausted { .. }) => "ReaderPoolExhausted",
        Some(PaceError::TaskPanicked { .. }) => "TaskPanicked",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let context: Vec<String> = err.chain().map(ToString::to_string).collect();
    let mut obj = json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
        "context": context,
    });
    if let Some(PaceError::Hardware {
        component,
        operation,
        ..
    }) = err.downcast_ref::<PaceError>()
    {
        obj["details"] = json!({ "component": component, "operation": operation });
    }
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[test]
    fn wrapped_pool_exhaustion_keeps_its_code() {
        let err: eyre::Result<()> = Err(PaceError::ReaderPoolExhausted { rounds: 28 }.into());
        let err = err.wrap_err("turbidostat service").unwrap_err();
        assert_eq!(exit_code_for_error(&err), 4);
        assert!(humanize(&err).contains("28 rounds"));
    }

    #[test]
    fn json_names_the_failing_device() {
        let err = eyre::Report::new(PaceError::Hardware {
            component: "robot",
            operation: "dispense",
            detail: "injected fault".into(),
        });
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Hardware");
        assert_eq!(v["exit_code"], 3);
        assert_eq!(v["details"]["operation"], "dispense");
    }

    #[test]
    fn untyped_errors_fall_back() {
        let err = eyre::eyre!("something odd");
        assert_eq!(exit_code_for_error(&err), 1);
        assert!(humanize(&err).contains("something odd"));
    }
}
