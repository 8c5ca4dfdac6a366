//! Parsing of structured (JSON) model output.

use crate::error::ApiError;
use serde::de::DeserializeOwned;

/// Remove a surrounding markdown code fence, if the model added one anyway.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json", "ts", ...) on the opening line.
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Decode a JSON object from model output.
pub fn parse_structured<T: DeserializeOwned>(raw: &str, what: &str) -> Result<T, ApiError> {
    let body = strip_code_fences(raw);
    if body.is_empty() {
        return Err(ApiError::InvalidResponse(format!("Empty {} response", what)));
    }
    serde_json::from_str(body).map_err(|e| {
        ApiError::InvalidResponse(format!("Failed to parse {} response: {}", what, e))
    })
}
