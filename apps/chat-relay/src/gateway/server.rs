//! WebSocket upgrade endpoint for the chat room.

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::header::ORIGIN;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::{ApiError, RelayError};
use crate::AppState;

use super::connection::ClientConnection;
use super::hub::HubError;
use super::session::{run_session, SessionLimits};

pub fn router() -> Router<AppState> {
    Router::new().route("/chat", get(ws_upgrade))
}

/// Origin is checked before anything else so a rejected request never
/// touches the hub.
async fn ws_upgrade(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    if !state.gate.admit_headers(&headers) {
        let origins: Vec<_> = headers.get_all(ORIGIN).iter().collect();
        tracing::debug!(?origins, "websocket origin rejected");
        return Err(RelayError::OriginRejected.into());
    }

    if state.hub.is_closed() {
        return Err(RelayError::from(HubError::Closed).into());
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let hub = Arc::clone(&state.hub);
    let limits = SessionLimits::from(state.config.as_ref());
    let capacity = state.config.outbound_queue_capacity;

    Ok(ws
        .max_message_size(state.config.max_message_bytes)
        .on_upgrade(move |socket| {
            let (connection, outbox) = ClientConnection::open(capacity);
            run_session(socket, hub, connection, outbox, limits)
        }))
}
