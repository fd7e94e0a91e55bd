//! Parsing of JSON payloads out of free-form model output.

use crate::error::{OracleError, OracleResult};
use serde::de::DeserializeOwned;

/// A payload the model is asked to return as JSON.
pub trait StructuredPayload: DeserializeOwned {
    /// Shape checks serde cannot express (non-empty fields, ranges).
    fn validate(&self) -> OracleResult<()>;
}

/// Extract, deserialize and validate a payload.
pub fn parse_payload<T: StructuredPayload>(response: &str) -> OracleResult<T> {
    let json = extract_json(response)?;
    let payload: T = serde_json::from_str(json)
        .map_err(|err| OracleError::MalformedPayload(format!("invalid JSON: {err}")))?;
    payload.validate()?;
    Ok(payload)
}

/// Extract JSON from a potentially markdown-wrapped response.
pub fn extract_json(response: &str) -> OracleResult<&str> {
    let trimmed = response.trim();

    if trimmed.starts_with('{') {
        return Ok(trimmed);
    }

    if let Some(start) = trimmed.find("```json") {
        let after_marker = &trimmed[start + 7..];
        if let Some(end) = after_marker.find("```") {
            return Ok(after_marker[..end].trim());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after_marker = &trimmed[start + 3..];
        if let Some(end) = after_marker.find("```") {
            let content = &after_marker[..end];
            if let Some(json_start) = content.find('{') {
                return Ok(content[json_start..].trim());
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            return Ok(&trimmed[start..=end]);
        }
    }

    Err(OracleError::MalformedPayload(
        "could not find JSON in response".to_string(),
    ))
}
