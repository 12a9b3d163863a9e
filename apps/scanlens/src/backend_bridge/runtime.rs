//! Analyzer worker: a dedicated thread owning a tokio runtime and the
//! streaming analysis client. UI commands arrive on a crossbeam queue;
//! client events are forwarded back as [`UiEvent`]s.

use std::{thread, time::Duration};

use client_core::{AnalysisClient, AnalysisClientConfig, CaptureContext, ClientEvent};
use crossbeam_channel::{Receiver, Sender};

use crate::backend_bridge::commands::BackendCommand;
use crate::config::Settings;
use crate::controller::events::{UiError, UiEvent};

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub endpoint: String,
    pub idle_timeout: Duration,
    pub context: CaptureContext,
}

impl From<&Settings> for BridgeConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            endpoint: settings.analyzer_url.clone(),
            idle_timeout: Duration::from_secs(settings.idle_timeout_secs),
            context: CaptureContext {
                country: settings.country.clone(),
                language: settings.language.clone(),
            },
        }
    }
}

fn forward_client_event(event: ClientEvent) -> UiEvent {
    match event {
        ClientEvent::SessionStarted { session_id } => UiEvent::SessionStarted { session_id },
        ClientEvent::ResultUpdated { session_id, result } => {
            UiEvent::ResultUpdated { session_id, result }
        }
        ClientEvent::SessionClosed { session_id } => UiEvent::SessionClosed { session_id },
        ClientEvent::SessionFailed {
            session_id,
            failure,
        } => UiEvent::SessionFailed {
            session_id,
            failure,
        },
    }
}

pub fn start_backend_bridge(
    config: BridgeConfig,
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(format!(
                    "analyzer worker startup failure: failed to build runtime: {err}"
                ))));
                tracing::error!("failed to build analyzer worker runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let client = AnalysisClient::new(AnalysisClientConfig {
                endpoint: config.endpoint,
                idle_timeout: config.idle_timeout,
            });

            let mut events = client.subscribe_events();
            let ui_events = ui_tx.clone();
            tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    let _ = ui_events.try_send(forward_client_event(event));
                }
            });

            let _ = ui_tx.try_send(UiEvent::Info("Analyzer worker ready".to_string()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    BackendCommand::Analyze { image_jpeg } => {
                        let session_id =
                            client.start_session(image_jpeg, config.context.clone()).await;
                        tracing::debug!(%session_id, "analysis session dispatched");
                    }
                }
            }
        });
    });
}
