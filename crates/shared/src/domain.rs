use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::{AlternativeItem, StreamEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Phase of one analysis session. `Closed` and `Failed` are terminal for that
/// session; a new capture always starts a fresh session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Connecting,
    Streaming,
    Closed,
    Failed,
}

/// Company field of a result: the backend names the company incrementally, so
/// the field starts out as a pending marker rather than an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyField {
    Analyzing,
    Named(String),
}

impl CompanyField {
    pub fn display_text(&self) -> &str {
        match self {
            CompanyField::Analyzing => "Analyzing…",
            CompanyField::Named(name) => name,
        }
    }
}

/// Incrementally populated analysis record. Fields are replaced independently
/// as stream events arrive; last write per field wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub company: CompanyField,
    pub product_type: String,
    pub cause: String,
    pub flagged: bool,
    pub alternatives: Vec<AlternativeItem>,
}

impl AnalysisResult {
    /// Placeholder shown the instant a capture is sent.
    pub fn analyzing() -> Self {
        Self {
            company: CompanyField::Analyzing,
            product_type: String::new(),
            cause: String::new(),
            flagged: false,
            alternatives: Vec::new(),
        }
    }

    /// Applies one stream event, replacing exactly one field. Returns whether
    /// anything changed; `Done` and unknown kinds apply nothing.
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        match event {
            StreamEvent::Company(name) => {
                self.company = CompanyField::Named(name.clone());
                true
            }
            StreamEvent::ProductType(value) => {
                self.product_type = value.clone();
                true
            }
            StreamEvent::Cause(value) => {
                self.cause = value.clone();
                true
            }
            StreamEvent::Boycott(flagged) => {
                self.flagged = *flagged;
                true
            }
            StreamEvent::Alternative(items) => {
                // The payload is the entire ordered list, not an increment.
                self.alternatives = items.clone();
                true
            }
            StreamEvent::Done | StreamEvent::Unknown => false,
        }
    }
}

impl Default for AnalysisResult {
    fn default() -> Self {
        Self::analyzing()
    }
}
