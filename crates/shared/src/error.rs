use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Connect,
    Transport,
    Protocol,
    Timeout,
    Internal,
}

/// Single user-visible failure signal for a session. A failed session keeps
/// whatever partial result fields were last applied and is never retried
/// automatically.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct SessionFailure {
    pub code: ErrorCode,
    pub message: String,
}

impl SessionFailure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
