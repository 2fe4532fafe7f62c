use serde::de::DeserializeOwned;
use std::io::{self, Read};

/// Read a piped JSON request from stdin and deserialise it.
///
/// Returns `None` when stdin is a terminal or the pipe is empty, so callers
/// can fall back to their own "input required" error.
pub fn read_stdin_json<T: DeserializeOwned>() -> Result<Option<T>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let request: T = serde_json::from_str(trimmed)
        .map_err(|e| format!("Failed to parse JSON from stdin: {}", e))?;
    Ok(Some(request))
}
