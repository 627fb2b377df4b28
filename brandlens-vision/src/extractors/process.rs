//! External process invocation shared by all capability clients
//!
//! Spawns `<program> <configured args..> <call args..>`, bounds it by the
//! configured timeout, and parses the single JSON object it prints.

use super::CapabilityError;
use crate::config::CapabilityConfig;
use serde_json::Value;
use std::ffi::OsStr;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Maximum stderr bytes carried into error messages
const STDERR_EXCERPT_LEN: usize = 512;

/// Run one capability process and return its JSON response
///
/// # Errors
/// - `NotInstalled` if the executable does not exist
/// - `Timeout` if the process outlives `config.timeout()` (it is killed)
/// - `Reported` if the response carries an `error` field
/// - `Failed` on non-zero exit without an error payload
/// - `Parse` if stdout holds no JSON object
pub async fn run_json<S: AsRef<OsStr>>(
    config: &CapabilityConfig,
    call_args: &[S],
) -> Result<Value, CapabilityError> {
    let timeout = config.timeout();

    let mut command = Command::new(&config.program);
    command
        .args(&config.args)
        .args(call_args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CapabilityError::NotInstalled(format!("{} not found", config.program))
        } else {
            CapabilityError::Spawn(e.to_string())
        }
    })?;

    // Dropping the wait future on timeout drops the child, which kills it
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| CapabilityError::Spawn(e.to_string()))?,
        Err(_) => return Err(CapabilityError::Timeout(timeout)),
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let response = parse_response(&stdout);

    debug!(
        program = %config.program,
        exit_code = ?output.status.code(),
        has_response = response.is_some(),
        "Capability process finished"
    );

    if let Some(message) = response.as_ref().and_then(error_payload) {
        return Err(CapabilityError::Reported(message));
    }

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CapabilityError::Failed {
            code: output.status.code(),
            stderr: excerpt(&stderr),
        });
    }

    response.ok_or_else(|| {
        CapabilityError::Parse(format!("no JSON object in output: {}", excerpt(&stdout)))
    })
}

/// Find the last stdout line that parses as a JSON object
///
/// Analysis tooling sometimes prints progress noise before its result.
pub fn parse_response(stdout: &str) -> Option<Value> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<Value>(line).ok())
        .filter(Value::is_object)
}

/// Extract the `error` message from a response, if any
pub fn error_payload(response: &Value) -> Option<String> {
    match response.get("error")? {
        Value::Null => None,
        Value::String(message) => Some(message.clone()),
        other => Some(other.to_string()),
    }
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(STDERR_EXCERPT_LEN) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
