//! Parsing of structured judge output

use serde::de::DeserializeOwned;

use crate::error::{EvalError, Result};

/// Extract JSON from a response that may be wrapped in markdown code blocks
pub fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```") {
        let after_start = &trimmed[start + 3..];
        let json_start = if after_start.starts_with("json") {
            after_start.find('\n').map(|i| i + 1).unwrap_or(0)
        } else if after_start.starts_with('\n') {
            1
        } else {
            0
        };
        let content = &after_start[json_start..];
        if let Some(end) = content.find("```") {
            return content[..end].trim();
        }
    }

    trimmed
}

/// Deserialize a judge completion into `T`
///
/// Empty completions and malformed JSON are both reported as retryable
/// judge errors rather than panics.
pub fn parse_json<T: DeserializeOwned>(response: &str) -> Result<T> {
    let json = extract_json(response);
    if json.is_empty() {
        return Err(EvalError::EmptyCompletion);
    }

    serde_json::from_str(json).map_err(|e| EvalError::MalformedResponse {
        reason: e.to_string(),
        response: response.to_string(),
    })
}
