//! Redaction of error text before it is shown to an operator
//!
//! Source URLs carry short-lived access signatures in their query string, so
//! any absolute URL embedded in a message is replaced wholesale.

use regex::Regex;
use std::sync::LazyLock;

pub const URL_REDACTED: &str = "[URL redacted]";
pub const UNKNOWN_ERROR: &str = "Unknown error occurred";

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("URL pattern is valid"));

pub fn sanitize_message(message: &str) -> String {
    if message.trim().is_empty() {
        return UNKNOWN_ERROR.to_string();
    }
    URL_PATTERN.replace_all(message, URL_REDACTED).into_owned()
}

pub fn sanitize_error(error: &dyn std::error::Error) -> String {
    sanitize_message(&error.to_string())
}
