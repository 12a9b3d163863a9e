//! Streaming analysis session client. Opens a duplex WebSocket to the
//! analyzer, sends one capture request, and folds the ordered stream of typed
//! partial results into an incrementally populated [`AnalysisResult`].

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures::{SinkExt, StreamExt};
use shared::{
    domain::{AnalysisResult, SessionId, SessionPhase},
    error::{ErrorCode, SessionFailure},
    protocol::{AnalyzeRequest, StreamEvent},
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{info, warn};

pub mod transport;

use transport::ws_endpoint;

/// Source of captured JPEG bytes (camera, file picker). External collaborator
/// boundary: `Ok(None)` means the user produced no capture, and a failure
/// means no session is started either way.
pub trait CaptureProvider: Send + Sync {
    fn capture(&self) -> Result<Option<Vec<u8>>>;
}

pub struct MissingCaptureProvider;

impl CaptureProvider for MissingCaptureProvider {
    fn capture(&self) -> Result<Option<Vec<u8>>> {
        Err(anyhow!("no capture source configured"))
    }
}

/// Per-capture context forwarded to the analyzer alongside the image.
#[derive(Debug, Clone, Default)]
pub struct CaptureContext {
    pub country: Option<String>,
    pub language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnalysisClientConfig {
    /// Analyzer endpoint; `http(s)` URLs are mapped to `ws(s)`.
    pub endpoint: String,
    /// Fail the session if no inbound frame arrives within this window.
    /// The analyzer enforces its own 25s budget per request, so the default
    /// sits above that.
    pub idle_timeout: Duration,
}

impl Default for AnalysisClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8000/ws/analyze/".to_string(),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid analyzer endpoint '{0}': expected http(s) or ws(s) URL")]
    InvalidEndpoint(String),
    #[error("failed to connect analyzer websocket: {0}")]
    Connect(String),
    #[error("failed to send analyze request: {0}")]
    Send(String),
    #[error("analyzer stream error: {0}")]
    Receive(String),
    #[error("malformed analyzer frame: {0}")]
    Protocol(String),
    #[error("no analyzer frame within {0:?}")]
    IdleTimeout(Duration),
}

impl SessionError {
    fn code(&self) -> ErrorCode {
        match self {
            SessionError::InvalidEndpoint(_) | SessionError::Connect(_) => ErrorCode::Connect,
            SessionError::Send(_) | SessionError::Receive(_) => ErrorCode::Transport,
            SessionError::Protocol(_) => ErrorCode::Protocol,
            SessionError::IdleTimeout(_) => ErrorCode::Timeout,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    SessionStarted {
        session_id: SessionId,
    },
    /// Snapshot of the result after one field update was applied.
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
}

struct ActiveSession {
    id: SessionId,
    generation: u64,
    phase: SessionPhase,
    task: Option<JoinHandle<()>>,
}

struct ClientState {
    session: Option<ActiveSession>,
    result: AnalysisResult,
}

/// One client per screen. Exactly one session may be live at a time; starting
/// a new capture supersedes the previous session, and generation checks make
/// any late callback from a superseded transport a no-op.
pub struct AnalysisClient {
    config: AnalysisClientConfig,
    generation: AtomicU64,
    inner: Mutex<ClientState>,
    events: broadcast::Sender<ClientEvent>,
}

impl AnalysisClient {
    pub fn new(config: AnalysisClientConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            config,
            generation: AtomicU64::new(0),
            inner: Mutex::new(ClientState {
                session: None,
                result: AnalysisResult::analyzing(),
            }),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Current phase and result, for consumers that subscribe late.
    pub async fn snapshot(&self) -> (SessionPhase, AnalysisResult) {
        let guard = self.inner.lock().await;
        let phase = guard
            .session
            .as_ref()
            .map(|session| session.phase)
            .unwrap_or(SessionPhase::Idle);
        (phase, guard.result.clone())
    }

    /// Starts a fresh session for one captured JPEG. Returns as soon as the
    /// transport task is spawned; progress arrives via [`subscribe_events`].
    ///
    /// A prior `Connecting`/`Streaming` session is closed and its callbacks
    /// discarded first, so a stale message can never corrupt the result a
    /// later capture owns.
    pub async fn start_session(
        self: &Arc<Self>,
        image_jpeg: Vec<u8>,
        context: CaptureContext,
    ) -> SessionId {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = SessionId::new();

        {
            let mut guard = self.inner.lock().await;
            if let Some(previous) = guard.session.take() {
                if matches!(
                    previous.phase,
                    SessionPhase::Connecting | SessionPhase::Streaming
                ) {
                    info!(
                        superseded = %previous.id,
                        by = %session_id,
                        "abandoning in-flight analysis session"
                    );
                    if let Some(task) = previous.task {
                        task.abort();
                    }
                    let _ = self.events.send(ClientEvent::SessionClosed {
                        session_id: previous.id,
                    });
                }
            }

            guard.result = AnalysisResult::analyzing();
            guard.session = Some(ActiveSession {
                id: session_id,
                generation,
                phase: SessionPhase::Connecting,
                task: None,
            });
            let _ = self.events.send(ClientEvent::SessionStarted { session_id });
            let _ = self.events.send(ClientEvent::ResultUpdated {
                session_id,
                result: guard.result.clone(),
            });
        }

        let client = Arc::clone(self);
        let task = tokio::spawn(async move {
            if let Err(err) = client
                .run_session(session_id, generation, image_jpeg, context)
                .await
            {
                client.fail_session(session_id, generation, err).await;
            }
        });

        let mut guard = self.inner.lock().await;
        match guard.session.as_mut() {
            Some(session) if session.generation == generation => {
                session.task = Some(task);
            }
            // Already superseded between spawn and re-lock.
            _ => task.abort(),
        }

        session_id
    }

    async fn run_session(
        self: &Arc<Self>,
        session_id: SessionId,
        generation: u64,
        image_jpeg: Vec<u8>,
        context: CaptureContext,
    ) -> Result<(), SessionError> {
        let url = ws_endpoint(&self.config.endpoint)?;
        let (mut socket, _) = connect_async(url.as_str())
            .await
            .map_err(|err| SessionError::Connect(err.to_string()))?;

        let request = AnalyzeRequest {
            image_data: format!("data:image/jpeg;base64,{}", STANDARD.encode(&image_jpeg)),
            country: context.country,
            language: context.language,
        };
        let payload = serde_json::to_string(&request)
            .map_err(|err| SessionError::Send(err.to_string()))?;
        socket
            .send(Message::Text(payload))
            .await
            .map_err(|err| SessionError::Send(err.to_string()))?;

        if !self.enter_streaming(generation).await {
            return Ok(());
        }
        info!(%session_id, "analyze request sent, streaming results");

        loop {
            let frame = tokio::time::timeout(self.config.idle_timeout, socket.next()).await;
            let message = match frame {
                Err(_) => return Err(SessionError::IdleTimeout(self.config.idle_timeout)),
                Ok(None) => {
                    return Err(SessionError::Receive(
                        "analyzer closed the stream before done".to_string(),
                    ))
                }
                Ok(Some(Err(err))) => return Err(SessionError::Receive(err.to_string())),
                Ok(Some(Ok(message))) => message,
            };

            match message {
                Message::Text(text) => {
                    let event: StreamEvent = serde_json::from_str(&text)
                        .map_err(|err| SessionError::Protocol(err.to_string()))?;
                    match event {
                        StreamEvent::Done => {
                            let _ = socket.send(Message::Close(None)).await;
                            self.close_session(session_id, generation).await;
                            return Ok(());
                        }
                        StreamEvent::Unknown => {
                            warn!(%session_id, "ignoring unknown analyzer frame kind");
                        }
                        update => {
                            self.apply_update(session_id, generation, &update).await;
                        }
                    }
                }
                Message::Close(_) => {
                    return Err(SessionError::Receive(
                        "analyzer closed the stream before done".to_string(),
                    ))
                }
                // Control frames carry no result data.
                _ => {}
            }
        }
    }

    /// Marks the session `Streaming`; returns false if it was superseded in
    /// the meantime.
    async fn enter_streaming(&self, generation: u64) -> bool {
        let mut guard = self.inner.lock().await;
        match guard.session.as_mut() {
            Some(session) if session.generation == generation => {
                session.phase = SessionPhase::Streaming;
                true
            }
            _ => false,
        }
    }

    async fn apply_update(&self, session_id: SessionId, generation: u64, update: &StreamEvent) {
        let mut guard = self.inner.lock().await;
        let current = matches!(
            guard.session.as_ref(),
            Some(session)
                if session.generation == generation && session.phase == SessionPhase::Streaming
        );
        if !current {
            return;
        }
        if guard.result.apply(update) {
            let _ = self.events.send(ClientEvent::ResultUpdated {
                session_id,
                result: guard.result.clone(),
            });
        }
    }

    async fn close_session(&self, session_id: SessionId, generation: u64) {
        let mut guard = self.inner.lock().await;
        if let Some(session) = guard.session.as_mut() {
            if session.generation == generation {
                session.phase = SessionPhase::Closed;
                info!(%session_id, "analysis session closed");
                let _ = self.events.send(ClientEvent::SessionClosed { session_id });
            }
        }
    }

    async fn fail_session(&self, session_id: SessionId, generation: u64, err: SessionError) {
        let mut guard = self.inner.lock().await;
        let Some(session) = guard.session.as_mut() else {
            return;
        };
        if session.generation != generation || session.phase == SessionPhase::Closed {
            return;
        }
        session.phase = SessionPhase::Failed;
        // Partial fields applied so far stay in place: stale but not corrupt.
        let failure = SessionFailure::new(err.code(), err.to_string());
        warn!(%session_id, code = ?failure.code, "analysis session failed: {}", failure.message);
        let _ = self.events.send(ClientEvent::SessionFailed {
            session_id,
            failure,
        });
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
