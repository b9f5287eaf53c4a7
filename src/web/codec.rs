//! Message formats accepted on the wire.

use crate::error::ApiError;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Content type of reversed JSON bodies.
pub const REVERSED_JSON: &str = "application/reversed-json";

/// How a request body is decoded and a response body encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Json,
    /// Compact JSON with its characters in reverse order.
    ReversedJson,
}

impl MessageFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            MessageFormat::Json => "application/json",
            MessageFormat::ReversedJson => REVERSED_JSON,
        }
    }

    pub fn decode<T: DeserializeOwned>(self, body: &[u8]) -> Result<T, ApiError> {
        let text = std::str::from_utf8(body)
            .map_err(|e| ApiError::InvalidMessage(format!("Body is not UTF-8: {}", e)))?;
        let parsed = match self {
            MessageFormat::Json => serde_json::from_str(text),
            MessageFormat::ReversedJson => serde_json::from_str(&reverse(text)),
        };
        parsed.map_err(|e| ApiError::InvalidMessage(e.to_string()))
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, ApiError> {
        let json = serde_json::to_string(value)?;
        Ok(match self {
            MessageFormat::Json => json.into_bytes(),
            MessageFormat::ReversedJson => reverse(&json).into_bytes(),
        })
    }
}

fn reverse(text: &str) -> String {
    text.chars().rev().collect()
}
