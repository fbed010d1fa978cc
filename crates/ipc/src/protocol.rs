//! Wire types for daemon communication
//!
//! One JSON object per line in each direction. Responses echo the request id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A request sent to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Unique request identifier
    pub id: String,
    /// Method name to invoke
    pub method: String,
    /// Method parameters as JSON value
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Request {
    /// Create a new request with a fresh ID
    pub fn new(method: impl Into<String>, params: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            method: method.into(),
            params: serde_json::to_value(params)?,
        })
    }
}

/// A response from the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Request ID this response corresponds to
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Error>,
}

impl Response {
    /// Create a success response
    pub fn success(id: impl Into<String>, result: impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: id.into(),
            result: Some(serde_json::to_value(result)?),
            error: None,
        })
    }

    /// Create an error response
    pub fn error(id: impl Into<String>, error: Error) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Split into the result value or the daemon-reported error
    pub fn into_result(self) -> Result<serde_json::Value, Error> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(serde_json::Value::Null)),
        }
    }
}

/// Error reported by the daemon
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(ErrorCode::MethodNotFound, format!("Unknown method: {}", method))
    }
}

/// Error codes carried in responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Invalid JSON
    ParseError,
    MethodNotFound,
    InvalidParams,
    /// Requested index or document does not exist
    NotFound,
    Internal,
    /// Daemon closed the connection before answering
    ConnectionError,
}
