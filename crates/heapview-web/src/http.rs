use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use heapview_wire::{ExpandReply, frame_text};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::app::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/debug", get(ws_upgrade))
        .route("/api/diagram", get(api_diagram))
        .route("/api/diagram/plantuml", get(api_plantuml))
        .route("/api/objects/{id}/expand", get(api_expand))
        .route("/api/snapshot", post(api_snapshot))
        .with_state(state)
}

fn json_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
        body,
    )
        .into_response()
}

fn text_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

async fn api_diagram(State(state): State<AppState>) -> Response {
    match state.current_document() {
        Ok(document) => json_response(StatusCode::OK, document),
        Err(e) => text_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("serialization error: {e}"),
        ),
    }
}

async fn api_plantuml(State(state): State<AppState>) -> Response {
    let diagram = state.collector.published();
    let text = heapview_render::to_plantuml(&diagram, &state.session.config().map_types);
    text_response(StatusCode::OK, text)
}

async fn api_expand(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.expand(id).await {
        ExpandReply::Expansion(diagram) => match heapview_wire::encode_diagram(&diagram) {
            Ok(document) => json_response(StatusCode::OK, document),
            Err(e) => text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("serialization error: {e}"),
            ),
        },
        ExpandReply::NotFound { requested } => text_response(
            StatusCode::NOT_FOUND,
            heapview_wire::not_found_message(&requested),
        ),
    }
}

async fn api_snapshot(State(state): State<AppState>) -> Response {
    match state.snapshot().await {
        Ok(diagram) => match heapview_wire::encode_diagram(&diagram) {
            Ok(document) => json_response(StatusCode::OK, document),
            Err(e) => text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("serialization error: {e}"),
            ),
        },
        Err(e) => text_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: AppState) {
    let mut rx = state.collector.subscribe();
    info!(viewers = state.collector.viewer_count(), "viewer connected");

    // Send the current diagram immediately.
    if send_current(&mut socket, &state).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    debug!(request = %text.as_str(), "viewer expansion request");
                    let answer = state.answer_expand_request(text.as_str().to_string()).await;
                    if send_framed(&mut socket, &answer, state.chunk_bytes).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "viewer socket error");
                    break;
                }
            },
            published = rx.recv() => match published {
                Ok(document) => {
                    if send_framed(&mut socket, &document, state.chunk_bytes).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "viewer lagged behind, sending latest diagram");
                    if send_current(&mut socket, &state).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    info!("viewer disconnected");
}

async fn send_current(socket: &mut WebSocket, state: &AppState) -> Result<(), axum::Error> {
    match state.current_document() {
        Ok(document) => send_framed(socket, &document, state.chunk_bytes).await,
        Err(e) => {
            warn!(error = %e, "failed to encode current diagram");
            Ok(())
        }
    }
}

async fn send_framed(
    socket: &mut WebSocket,
    text: &str,
    chunk_bytes: usize,
) -> Result<(), axum::Error> {
    let frames = frame_text(text, chunk_bytes);
    if frames.len() > 1 {
        debug!(bytes = text.len(), frames = frames.len(), "sending chunked payload");
    }
    for frame in frames {
        socket.send(Message::Text(frame.into())).await?;
    }
    Ok(())
}
