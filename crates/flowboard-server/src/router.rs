//! Router assembly and handlers for the relay.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::RelayError;
use crate::protocol::ClientMessage;
use crate::state::AppState;

/// Builds the relay router.
///
/// CORS is permissive so browser clients on other origins can read and
/// write the board.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/board.json", get(get_board).post(post_board))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

async fn get_board(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let board = state.board().await;
    ([(header::CONTENT_TYPE, "application/json")], board.to_string())
}

async fn post_board(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, RelayError> {
    state.write_board(&body).await?;
    Ok(Json(json!({})))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    // Subscribe before the snapshot so no accepted write is missed
    let mut rx = state.subscribe();
    let peer_id = state.join();
    info!("New connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();

    let sent = match state.init_frame(&peer_id).await {
        Ok(init) => sender.send(Message::Text(init.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to build init for {}: {}", peer_id, e);
            false
        }
    };

    if sent {
        state.broadcast_presence();

        loop {
            tokio::select! {
                msg = receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ClientMessage>(&text) {
                                Ok(ClientMessage::Hello { name }) => {
                                    state.rename(&peer_id, &name);
                                    state.broadcast_presence();
                                }
                                Err(e) => warn!("Invalid message from {}: {}", peer_id, e),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {} // Ignore binary/ping/pong
                        Some(Err(e)) => {
                            warn!("WebSocket error for {}: {}", peer_id, e);
                            break;
                        }
                    }
                }

                frame = rx.recv() => {
                    let frame = match frame {
                        Ok(frame) => frame,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Peer {} lagged by {} frame(s); resending board", peer_id, skipped);
                            state.board().await
                        }
                        Err(RecvError::Closed) => break,
                    };
                    if sender.send(Message::Text(frame.to_string().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    // Cleanup on disconnect
    state.leave(&peer_id);
    state.broadcast_presence();
    info!("Connection closed: {}", peer_id);
}
