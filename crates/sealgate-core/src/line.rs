//! Shared framing rules for the newline-delimited protocols
//!
//! Requests are one ASCII line of space-separated tokens; binary fields are
//! hex. Because payloads are hex, a payload can never contain `\n`, so a
//! response is always exactly one line.

/// Prefix of every failure response line
pub const ERROR_PREFIX: &str = "ERROR ";

/// Strip the line terminator and trailing spaces, then split on single spaces.
///
/// Consecutive spaces yield empty tokens, which then fail the arity check.
pub fn split_fields(line: &str) -> Vec<&str> {
    line.trim_end_matches(|c: char| c == ' ' || c == '\n' || c == '\r')
        .split(' ')
        .collect()
}

/// Hex-decode every token, stopping at the first invalid one.
pub fn decode_hex_fields(fields: &[&str]) -> Result<Vec<Vec<u8>>, hex::FromHexError> {
    fields.iter().map(hex::decode).collect()
}

/// Render a failure as a single `ERROR <message>\n` line.
pub fn error_line(message: &str) -> String {
    let flat: String = message
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    format!("{ERROR_PREFIX}{flat}\n")
}

/// If `response` is an error line, return its message.
pub fn error_message(response: &str) -> Option<&str> {
    response
        .strip_prefix(ERROR_PREFIX)
        .or_else(|| (response == ERROR_PREFIX.trim_end()).then_some(""))
}
