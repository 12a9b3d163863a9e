use serde::{Deserialize, Serialize};

/// Outbound request, sent exactly once per session immediately after connect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// `data:image/jpeg;base64,…` URI of the captured frame.
    pub image_data: String,
    pub country: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeItem {
    pub company_name: String,
    pub product_name: String,
    pub product_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Inbound stream frames. `done` is always last; every other kind updates one
/// result field. Kinds this client does not know are a forward-compatible
/// no-op rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StreamEvent {
    Company(String),
    ProductType(String),
    Cause(String),
    Boycott(bool),
    Alternative(Vec<AlternativeItem>),
    Done,
    Unknown,
}

// Manual impl because `#[serde(other)]` on an adjacently tagged enum cannot
// discard the `value` payload of an unrecognized kind.
impl<'de> Deserialize<'de> for StreamEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(tag = "type", content = "value", rename_all = "snake_case")]
        enum Known {
            Company(String),
            ProductType(String),
            Cause(String),
            Boycott(bool),
            Alternative(Vec<AlternativeItem>),
            Done,
        }

        let raw = serde_json::Value::deserialize(deserializer)?;
        let kind = raw
            .get("type")
            .ok_or_else(|| serde::de::Error::missing_field("type"))?
            .as_str()
            .ok_or_else(|| serde::de::Error::custom("frame `type` must be a string"))?;
        match kind {
            "company" | "product_type" | "cause" | "boycott" | "alternative" | "done" => {
                Known::deserialize(raw)
                    .map(|known| match known {
                        Known::Company(v) => StreamEvent::Company(v),
                        Known::ProductType(v) => StreamEvent::ProductType(v),
                        Known::Cause(v) => StreamEvent::Cause(v),
                        Known::Boycott(v) => StreamEvent::Boycott(v),
                        Known::Alternative(v) => StreamEvent::Alternative(v),
                        Known::Done => StreamEvent::Done,
                    })
                    .map_err(serde::de::Error::custom)
            }
            _ => Ok(StreamEvent::Unknown),
        }
    }
}
