use super::*;
use std::collections::VecDeque;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use tokio::{net::TcpListener, sync::Notify};

/// One scripted action per inbound connection. Each new connection pops the
/// next script from the queue.
#[derive(Clone)]
enum ServerAction {
    Frame(&'static str),
    Wait(Arc<Notify>),
    Close,
}

#[derive(Clone)]
struct TestServerState {
    scripts: Arc<Mutex<VecDeque<Vec<ServerAction>>>>,
    requests: Arc<Mutex<Vec<AnalyzeRequest>>>,
}

async fn ws_handler(
    State(state): State<TestServerState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_script(socket, state))
}

async fn run_script(mut socket: WebSocket, state: TestServerState) {
    // Exactly one analyze request opens every session.
    let Some(Ok(WsMessage::Text(text))) = socket.recv().await else {
        return;
    };
    let Ok(request) = serde_json::from_str::<AnalyzeRequest>(&text) else {
        return;
    };
    state.requests.lock().await.push(request);

    let script = state
        .scripts
        .lock()
        .await
        .pop_front()
        .unwrap_or_default();
    for action in script {
        match action {
            ServerAction::Frame(json) => {
                if socket.send(WsMessage::Text(json.to_string())).await.is_err() {
                    return;
                }
            }
            ServerAction::Wait(notify) => notify.notified().await,
            ServerAction::Close => {
                let _ = socket.send(WsMessage::Close(None)).await;
                return;
            }
        }
    }
}

struct TestServer {
    endpoint: String,
    state: TestServerState,
}

async fn spawn_server(scripts: Vec<Vec<ServerAction>>) -> TestServer {
    let state = TestServerState {
        scripts: Arc::new(Mutex::new(scripts.into_iter().collect())),
        requests: Arc::new(Mutex::new(Vec::new())),
    };
    let router = Router::new()
        .route("/ws/analyze/", get(ws_handler))
        .with_state(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    TestServer {
        endpoint: format!("http://{addr}/ws/analyze/"),
        state,
    }
}

fn client_for(server: &TestServer) -> Arc<AnalysisClient> {
    AnalysisClient::new(AnalysisClientConfig {
        endpoint: server.endpoint.clone(),
        idle_timeout: Duration::from_secs(5),
    })
}

async fn next_event(rx: &mut broadcast::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for client event")
        .expect("event channel closed")
}

async fn wait_for_closed(rx: &mut broadcast::Receiver<ClientEvent>, session_id: SessionId) {
    loop {
        if let ClientEvent::SessionClosed { session_id: id } = next_event(rx).await {
            if id == session_id {
                return;
            }
        }
    }
}

async fn wait_for_failure(
    rx: &mut broadcast::Receiver<ClientEvent>,
    session_id: SessionId,
) -> SessionFailure {
    loop {
        if let ClientEvent::SessionFailed {
            session_id: id,
            failure,
        } = next_event(rx).await
        {
            if id == session_id {
                return failure;
            }
        }
    }
}

#[tokio::test]
async fn streams_fields_in_arrival_order_until_done() {
    let server = spawn_server(vec![vec![
        ServerAction::Frame(r#"{"type":"boycott","value":true}"#),
        ServerAction::Frame(r#"{"type":"cause","value":"X"}"#),
        ServerAction::Frame(r#"{"type":"company","value":"Acme"}"#),
        ServerAction::Frame(r#"{"type":"done"}"#),
    ]])
    .await;
    let client = client_for(&server);
    let mut events = client.subscribe_events();

    let session_id = client
        .start_session(
            b"jpeg".to_vec(),
            CaptureContext {
                country: Some("EG".to_string()),
                language: Some("Arabic".to_string()),
            },
        )
        .await;
    wait_for_closed(&mut events, session_id).await;

    let (phase, result) = client.snapshot().await;
    assert_eq!(phase, SessionPhase::Closed);
    assert!(result.flagged);
    assert_eq!(result.cause, "X");
    assert_eq!(result.company.display_text(), "Acme");

    // The single outbound request carried the data URI and the context.
    let requests = server.state.requests.lock().await;
    assert_eq!(requests.len(), 1);
    assert!(requests[0].image_data.starts_with("data:image/jpeg;base64,"));
    assert_eq!(requests[0].country.as_deref(), Some("EG"));
}

#[tokio::test]
async fn result_resets_to_placeholder_on_capture() {
    let server = spawn_server(vec![vec![ServerAction::Frame(r#"{"type":"done"}"#)]]).await;
    let client = client_for(&server);
    let mut events = client.subscribe_events();

    let session_id = client.start_session(b"jpeg".to_vec(), CaptureContext::default()).await;

    // First events: started, then the analyzing placeholder snapshot.
    assert!(matches!(
        next_event(&mut events).await,
        ClientEvent::SessionStarted { session_id: id } if id == session_id
    ));
    match next_event(&mut events).await {
        ClientEvent::ResultUpdated { result, .. } => {
            assert_eq!(result, AnalysisResult::analyzing());
        }
        other => panic!("expected placeholder snapshot, got {other:?}"),
    }
    wait_for_closed(&mut events, session_id).await;
}

#[tokio::test]
async fn frames_after_done_are_not_applied() {
    let server = spawn_server(vec![vec![
        ServerAction::Frame(r#"{"type":"cause","value":"X"}"#),
        ServerAction::Frame(r#"{"type":"done"}"#),
        // Late frame a slow backend might still emit.
        ServerAction::Frame(r#"{"type":"cause","value":"Y"}"#),
    ]])
    .await;
    let client = client_for(&server);
    let mut events = client.subscribe_events();

    let session_id = client.start_session(b"jpeg".to_vec(), CaptureContext::default()).await;
    wait_for_closed(&mut events, session_id).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    let (phase, result) = client.snapshot().await;
    assert_eq!(phase, SessionPhase::Closed);
    assert_eq!(result.cause, "X");
    assert!(matches!(
        events.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn unknown_frame_kinds_are_ignored() {
    let server = spawn_server(vec![vec![
        ServerAction::Frame(r#"{"type":"confidence","value":0.93}"#),
        ServerAction::Frame(r#"{"type":"company","value":"Acme"}"#),
        ServerAction::Frame(r#"{"type":"done"}"#),
    ]])
    .await;
    let client = client_for(&server);
    let mut events = client.subscribe_events();

    let session_id = client.start_session(b"jpeg".to_vec(), CaptureContext::default()).await;
    wait_for_closed(&mut events, session_id).await;

    let (phase, result) = client.snapshot().await;
    assert_eq!(phase, SessionPhase::Closed);
    assert_eq!(result.company.display_text(), "Acme");
}

#[tokio::test]
async fn malformed_frame_fails_the_session() {
    let server = spawn_server(vec![vec![
        ServerAction::Frame(r#"{"type":"company","value":"Acme"}"#),
        ServerAction::Frame("this is not json"),
    ]])
    .await;
    let client = client_for(&server);
    let mut events = client.subscribe_events();

    let session_id = client.start_session(b"jpeg".to_vec(), CaptureContext::default()).await;
    let failure = wait_for_failure(&mut events, session_id).await;
    assert_eq!(failure.code, ErrorCode::Protocol);

    // Fields applied before the failure stay in place.
    let (phase, result) = client.snapshot().await;
    assert_eq!(phase, SessionPhase::Failed);
    assert_eq!(result.company.display_text(), "Acme");
}

#[tokio::test]
async fn stream_drop_before_done_fails_the_session() {
    let server = spawn_server(vec![vec![
        ServerAction::Frame(r#"{"type":"boycott","value":true}"#),
        ServerAction::Close,
    ]])
    .await;
    let client = client_for(&server);
    let mut events = client.subscribe_events();

    let session_id = client.start_session(b"jpeg".to_vec(), CaptureContext::default()).await;
    let failure = wait_for_failure(&mut events, session_id).await;
    assert_eq!(failure.code, ErrorCode::Transport);

    let (phase, result) = client.snapshot().await;
    assert_eq!(phase, SessionPhase::Failed);
    assert!(result.flagged);
}

#[tokio::test]
async fn connect_failure_fails_the_session_without_retry() {
    let client = AnalysisClient::new(AnalysisClientConfig {
        // Nothing listens here; connection is refused immediately.
        endpoint: "http://127.0.0.1:1/ws/analyze/".to_string(),
        idle_timeout: Duration::from_secs(1),
    });
    let mut events = client.subscribe_events();

    let session_id = client.start_session(b"jpeg".to_vec(), CaptureContext::default()).await;
    let failure = wait_for_failure(&mut events, session_id).await;
    assert_eq!(failure.code, ErrorCode::Connect);

    // No automatic retry: nothing further happens.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(
        events.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}

#[tokio::test]
async fn silent_stream_times_out() {
    let stall = Arc::new(Notify::new());
    let server = spawn_server(vec![vec![ServerAction::Wait(stall)]]).await;
    let client = AnalysisClient::new(AnalysisClientConfig {
        endpoint: server.endpoint.clone(),
        idle_timeout: Duration::from_millis(200),
    });
    let mut events = client.subscribe_events();

    let session_id = client.start_session(b"jpeg".to_vec(), CaptureContext::default()).await;
    let failure = wait_for_failure(&mut events, session_id).await;
    assert_eq!(failure.code, ErrorCode::Timeout);
}

#[tokio::test]
async fn new_capture_supersedes_streaming_session() {
    let gate = Arc::new(Notify::new());
    let server = spawn_server(vec![
        vec![
            ServerAction::Frame(r#"{"type":"company","value":"Old"}"#),
            ServerAction::Wait(Arc::clone(&gate)),
            // Delivered to an abandoned session; must never surface.
            ServerAction::Frame(r#"{"type":"cause","value":"stale"}"#),
            ServerAction::Frame(r#"{"type":"done"}"#),
        ],
        vec![
            ServerAction::Frame(r#"{"type":"company","value":"New"}"#),
            ServerAction::Frame(r#"{"type":"done"}"#),
        ],
    ])
    .await;
    let client = client_for(&server);
    let mut events = client.subscribe_events();

    let first = client.start_session(b"first".to_vec(), CaptureContext::default()).await;
    // Wait until session A has applied its first field.
    loop {
        if let ClientEvent::ResultUpdated { session_id, result } = next_event(&mut events).await {
            if session_id == first && result.company.display_text() == "Old" {
                break;
            }
        }
    }

    let second = client.start_session(b"second".to_vec(), CaptureContext::default()).await;
    wait_for_closed(&mut events, second).await;

    // Unblock session A's server script; its frames go nowhere.
    gate.notify_one();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let (phase, result) = client.snapshot().await;
    assert_eq!(phase, SessionPhase::Closed);
    assert_eq!(result.company.display_text(), "New");
    assert_eq!(result.cause, "");
    assert!(matches!(
        events.try_recv(),
        Err(broadcast::error::TryRecvError::Empty)
    ));
}
