//! UI/backend events and error modeling for the scan screen.

use shared::{
    domain::{AnalysisResult, SessionId},
    error::{ErrorCode, SessionFailure},
};

pub enum UiEvent {
    Info(String),
    SessionStarted {
        session_id: SessionId,
    },
    ResultUpdated {
        session_id: SessionId,
        result: AnalysisResult,
    },
    SessionClosed {
        session_id: SessionId,
    },
    SessionFailed {
        session_id: SessionId,
        failure: SessionFailure,
    },
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Capture,
    Transport,
    Protocol,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    message: String,
}

impl UiError {
    pub fn capture(message: impl Into<String>) -> Self {
        Self {
            category: UiErrorCategory::Capture,
            message: message.into(),
        }
    }

    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            category: UiErrorCategory::Unknown,
            message: message.into(),
        }
    }

    pub fn from_failure(failure: &SessionFailure) -> Self {
        let category = match failure.code {
            ErrorCode::Connect | ErrorCode::Transport | ErrorCode::Timeout => {
                UiErrorCategory::Transport
            }
            ErrorCode::Protocol => UiErrorCategory::Protocol,
            ErrorCode::Internal => UiErrorCategory::Unknown,
        };
        Self {
            category,
            message: failure.message.clone(),
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn err_label(category: UiErrorCategory) -> &'static str {
    match category {
        UiErrorCategory::Capture => "Capture",
        UiErrorCategory::Transport => "Transport",
        UiErrorCategory::Protocol => "Protocol",
        UiErrorCategory::Unknown => "Unexpected",
    }
}
