//! Human-readable error descriptions and structured JSON error formatting.
//! Tries a typed downcast to [`RowError`] first, then falls back to string
//! heuristics for errors that only reach us as an opaque `eyre::Report`.

use rowmetrics_core::RowError;
use serde_json::json;

/// Map an `eyre::Report` to a human-readable explanation with likely causes
/// and a fix hint.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(re) = err.downcast_ref::<RowError>() {
        return match re {
            RowError::Contract(msg) => format!(
                "What happened: Invalid request ({msg}).\nLikely causes: Unknown or stale session id.\nHow to fix: List sessions with `sessions list` and retry with a valid id."
            ),
            RowError::Resource(msg) => format!(
                "What happened: Resource exhausted ({msg}).\nLikely causes: Sample ring or client list is full, or the session store rejected a write.\nHow to fix: Check free space under the configured --data-dir and session length."
            ),
            RowError::Protocol(msg) => format!(
                "What happened: Broadcast back-pressure ({msg}).\nLikely causes: A client is not draining notifications fast enough.\nHow to fix: This is retried on the next tick; if persistent, check the client's connection."
            ),
            RowError::Fatal(msg) => format!(
                "What happened: Unrecoverable startup failure ({msg}).\nLikely causes: A mutex or device handle failed to initialize.\nHow to fix: Re-run with --log-level=debug and check hardware wiring/permissions."
            ),
        };
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("gpio") {
        return "What happened: Failed to initialize a GPIO pin.\nLikely causes: Incorrect BCM pin number or insufficient GPIO permissions.\nHow to fix: Check --flywheel-pin/--seat-pin and ensure the process can access /dev/gpiomem.".to_string();
    }
    if lower.contains("parse config") || lower.contains("invalid configuration") {
        return "What happened: Configuration is invalid or malformed.\nLikely causes: Syntax error in the TOML, or an out-of-range value.\nHow to fix: Edit the config file and try again.".to_string();
    }
    if lower.contains("physics calibration csv") {
        return "What happened: The physics calibration CSV could not be read.\nLikely causes: Wrong headers, wrong row count, or an out-of-range value.\nHow to fix: The CSV must have exactly the header 'moment_of_inertia,initial_k' and one data row.".to_string();
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes for known error classes; anything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(re) = err.downcast_ref::<RowError>() {
        return match re {
            RowError::Contract(_) => 2,
            RowError::Resource(_) => 3,
            RowError::Protocol(_) => 4,
            RowError::Fatal(_) => 5,
        };
    }
    1
}

/// Structured JSON for errors when `--json` is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    if let Some(re) = err.downcast_ref::<RowError>() {
        let reason = match re {
            RowError::Contract(_) => "contract",
            RowError::Resource(_) => "resource",
            RowError::Protocol(_) => "protocol",
            RowError::Fatal(_) => "fatal",
        };
        return json!({ "reason": reason, "message": humanize(err) }).to_string();
    }
    json!({ "reason": "error", "message": humanize(err) }).to_string()
}
