//! Shared HTTP utilities for the customers service workspace.
//!
//! Provides the JSON error envelope, path id parsing and calendar date
//! helpers used by the server handlers.

use chrono::NaiveDate;

// ============================================================================
// JSON Response Helpers (framework-agnostic)
// ============================================================================

/// Create a structured error JSON with a default message based on the code.
///
/// Returns: `{"error": {"code": "<code>", "message": "<default message>"}}`
pub fn json_err(code: &str) -> serde_json::Value {
    let message = match code {
        "not_found" => "Resource not found",
        "bad_request" => "Bad request",
        "validation_failed" => "Validation failed",
        "upstream_error" => "Upstream service failure",
        "error" | "internal" => "Internal server error",
        _ => code, // Fallback to code as message for unknown codes
    };
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create a structured error JSON with a custom message.
///
/// Returns: `{"error": {"code": "<code>", "message": "<message>"}}`
pub fn json_error_with_message(code: &str, message: &str) -> serde_json::Value {
    serde_json::json!({"error": {"code": code, "message": message}})
}

/// Create a validation error JSON listing every field violation.
///
/// Returns:
/// `{"error": {"code": "validation_failed", "message": "...", "violations": [{"field": "...", "message": "..."}]}}`
pub fn json_validation_error<'a, 'b, I>(violations: I) -> serde_json::Value
where
    I: IntoIterator<Item = (&'a str, &'b str)>,
{
    let list: Vec<serde_json::Value> = violations
        .into_iter()
        .map(|(field, message)| serde_json::json!({"field": field, "message": message}))
        .collect();
    serde_json::json!({
        "error": {
            "code": "validation_failed",
            "message": "Validation failed",
            "violations": list,
        }
    })
}

// ============================================================================
// Path Parsing
// ============================================================================

/// Parse a numeric path segment such as `ownerId`.
///
/// Returns `None` for anything that is not a base-10 integer.
pub fn parse_id(segment: &str) -> Option<i64> {
    segment.trim().parse::<i64>().ok()
}

// ============================================================================
// Date Utilities
// ============================================================================

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Format a calendar date as `YYYY-MM-DD`.
pub fn format_date(d: NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
}
