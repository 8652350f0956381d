//! End-to-end tests for the relay: HTTP routes through `oneshot`, and live
//! WebSocket peers against a server bound to an ephemeral port.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;

use flowboard_server::state::DEFAULT_BOARD;
use flowboard_server::{AppState, ServerConfig, build_router};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn test_app(dir: &tempfile::TempDir) -> Router {
    let config = ServerConfig::for_board(dir.path().join("board.json"));
    build_router(Arc::new(AppState::new(&config)))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn get_board(app: &Router) -> (StatusCode, String) {
    send(app, Request::builder().uri("/board.json").body(Body::empty()).unwrap()).await
}

async fn post_board(app: &Router, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method("POST")
        .uri("/board.json")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Serve `app` on an ephemeral port.
async fn spawn_server(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    ws
}

/// Next text frame as JSON.
async fn next_json(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Next frame of the given type, skipping others.
async fn next_of_type(ws: &mut Client, kind: &str) -> Value {
    loop {
        let frame = next_json(ws).await;
        if frame["type"] == kind {
            return frame;
        }
    }
}

/// Next bare board frame, skipping tagged ones.
async fn next_board(ws: &mut Client) -> Value {
    loop {
        let frame = next_json(ws).await;
        if frame.get("type").is_none() {
            return frame;
        }
    }
}

fn board_with_node(id: &str) -> String {
    json!({
        "nodes": [{ "id": id, "type": "text", "x": 0, "y": 0, "width": 200, "height": 80, "text": id }],
        "edges": [],
        "view": { "panX": 80, "panY": 80, "zoom": 1 }
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_get_default_board() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);
    let (status, body) = get_board(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, DEFAULT_BOARD);
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);
    let (status, body) = send(&app, Request::builder().uri("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_post_invalid_json_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let (status, body) = post_board(&app, "{\"nodes\": [").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({ "error": "Invalid JSON" }));

    let (_, board) = get_board(&app).await;
    assert_eq!(board, DEFAULT_BOARD);
    assert!(!dir.path().join("board.json").exists());
}

#[tokio::test]
async fn test_post_valid_board_is_persisted_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);
    let body = board_with_node("n1");

    let (status, reply) = post_board(&app, &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply, "{}");

    let (_, board) = get_board(&app).await;
    assert_eq!(board, body);
    assert_eq!(std::fs::read_to_string(dir.path().join("board.json")).unwrap(), body);
}

#[tokio::test]
async fn test_startup_loads_board_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("board.json");
    let body = board_with_node("saved");
    std::fs::write(&path, &body).unwrap();

    let state = AppState::load(&ServerConfig::for_board(&path)).await;
    let app = build_router(Arc::new(state));
    let (_, board) = get_board(&app).await;
    assert_eq!(board, body);
}

#[tokio::test]
async fn test_cors_preflight() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/board.json")
        .header("origin", "http://example.com")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response.status().is_success());
    assert!(response.headers().contains_key("access-control-allow-origin"));
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_init_presence_and_hello() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_server(test_app(&dir)).await;

    let mut ws = connect(addr).await;
    let init = next_json(&mut ws).await;
    assert_eq!(init["type"], "init");
    let my_id = init["yourId"].as_str().unwrap().to_string();
    assert_eq!(init["users"], json!([{ "id": my_id, "name": "Anonymous" }]));
    assert_eq!(init["board"], serde_json::from_str::<Value>(DEFAULT_BOARD).unwrap());

    let presence = next_of_type(&mut ws, "presence").await;
    assert_eq!(presence["users"].as_array().unwrap().len(), 1);

    ws.send(Message::Text(r#"{"type":"hello","name":"  Ada  "}"#.into()))
        .await
        .unwrap();
    let presence = next_of_type(&mut ws, "presence").await;
    assert_eq!(presence["users"], json!([{ "id": my_id, "name": "Ada" }]));
}

#[tokio::test]
async fn test_presence_tracks_join_and_leave() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_server(test_app(&dir)).await;

    let mut a = connect(addr).await;
    next_of_type(&mut a, "init").await;
    next_of_type(&mut a, "presence").await;

    let mut b = connect(addr).await;
    let init_b = next_of_type(&mut b, "init").await;
    assert_eq!(init_b["users"].as_array().unwrap().len(), 2);
    let presence = next_of_type(&mut a, "presence").await;
    assert_eq!(presence["users"].as_array().unwrap().len(), 2);

    b.close(None).await.unwrap();
    let presence = next_of_type(&mut a, "presence").await;
    assert_eq!(presence["users"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_two_peers_last_writer_wins() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);
    let addr = spawn_server(app.clone()).await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    next_of_type(&mut a, "init").await;
    next_of_type(&mut b, "init").await;

    let first = board_with_node("from-a");
    let second = board_with_node("from-b");
    assert_eq!(post_board(&app, &first).await.0, StatusCode::OK);
    assert_eq!(post_board(&app, &second).await.0, StatusCode::OK);

    // Both peers, the writer included, see both writes in acceptance order
    for ws in [&mut a, &mut b] {
        assert_eq!(next_board(ws).await["nodes"][0]["id"], "from-a");
        assert_eq!(next_board(ws).await["nodes"][0]["id"], "from-b");
    }

    let (_, board) = get_board(&app).await;
    assert_eq!(board, second);

    // A late joiner starts from the winning board
    let mut c = connect(addr).await;
    let init = next_of_type(&mut c, "init").await;
    assert_eq!(init["board"]["nodes"][0]["id"], "from-b");
}

#[tokio::test]
async fn test_unknown_message_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let addr = spawn_server(test_app(&dir)).await;

    let mut ws = connect(addr).await;
    next_of_type(&mut ws, "init").await;
    next_of_type(&mut ws, "presence").await;

    ws.send(Message::Text(r#"{"type":"sync","data":"x"}"#.into())).await.unwrap();
    ws.send(Message::Text(r#"{"type":"hello","name":"Bo"}"#.into())).await.unwrap();
    let presence = next_of_type(&mut ws, "presence").await;
    assert_eq!(presence["users"][0]["name"], "Bo");
}
