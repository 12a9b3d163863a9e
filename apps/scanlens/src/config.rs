use std::fs;

use panel::PanelConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub analyzer_url: String,
    pub country: Option<String>,
    pub language: Option<String>,
    pub idle_timeout_secs: u64,
    /// How long the preview must be held before a capture fires.
    pub hold_to_capture_ms: u64,
    pub panel: PanelConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            analyzer_url: "http://127.0.0.1:8000/ws/analyze/".into(),
            country: None,
            language: None,
            idle_timeout_secs: 30,
            hold_to_capture_ms: 1000,
            panel: PanelConfig::default(),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("scanlens.toml") {
        match toml::from_str::<Settings>(&raw) {
            Ok(file_cfg) => settings = file_cfg,
            Err(err) => tracing::warn!("ignoring malformed scanlens.toml: {err}"),
        }
    }

    if let Ok(v) = std::env::var("SCANLENS_ANALYZER_URL") {
        settings.analyzer_url = v;
    }
    if let Ok(v) = std::env::var("SCANLENS_COUNTRY") {
        settings.country = Some(v);
    }
    if let Ok(v) = std::env::var("SCANLENS_LANGUAGE") {
        settings.language = Some(v);
    }
    if let Ok(v) = std::env::var("SCANLENS_IDLE_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.idle_timeout_secs = parsed;
        }
    }

    settings
}
