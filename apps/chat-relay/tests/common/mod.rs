#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::ORIGIN;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use chat_relay::config::Config;
use chat_relay::AppState;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const ALLOWED_ORIGIN: &str = "http://localhost:9091";

pub fn test_app() -> (Router, AppState) {
    test_app_with(Config::default())
}

pub fn test_app_with(config: Config) -> (Router, AppState) {
    let state = AppState::new(config);
    let app = chat_relay::routes::router().with_state(state.clone());
    (app, state)
}

/// Start an actual TCP server for WebSocket testing. The server runs in the
/// background.
pub async fn start_ws_server() -> (SocketAddr, AppState) {
    start_ws_server_with(Config::default()).await
}

pub async fn start_ws_server_with(config: Config) -> (SocketAddr, AppState) {
    let (app, state) = test_app_with(config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Open `/chat` sending each of `origins` as an `Origin` header.
pub async fn connect_with_origins(
    addr: SocketAddr,
    origins: &[&str],
) -> Result<WsClient, tungstenite::Error> {
    let mut request = format!("ws://{addr}/chat")
        .into_client_request()
        .expect("client request");
    for origin in origins {
        request
            .headers_mut()
            .append(ORIGIN, HeaderValue::from_str(origin).expect("header value"));
    }
    let (ws, _) = tokio_tungstenite::connect_async(request).await?;
    Ok(ws)
}

/// Connect from an allowed origin and wait until the hub counts the new
/// member, so later publishes are guaranteed to reach it.
pub async fn join(addr: SocketAddr, state: &AppState) -> WsClient {
    let before = state.hub.member_count();
    let ws = connect_with_origins(addr, &[ALLOWED_ORIGIN])
        .await
        .expect("ws connect");
    wait_for_members(state, before + 1).await;
    ws
}

pub async fn wait_for_members(state: &AppState, expected: usize) {
    time::timeout(Duration::from_secs(5), async {
        while state.hub.member_count() != expected {
            time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "expected {expected} members, hub has {}",
            state.hub.member_count()
        )
    });
}

/// Read the next text frame, skipping keepalive traffic.
pub async fn next_text(ws: &mut WsClient) -> String {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for message")
            .expect("stream ended")
            .expect("ws read error");
        match msg {
            Message::Text(text) => return text.as_str().to_owned(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Expected text frame, got: {other:?}"),
        }
    }
}

/// Read frames until the server's close frame arrives and return its code.
/// Panics if the connection drops without a closing handshake.
pub async fn expect_close(ws: &mut WsClient) -> CloseCode {
    time::timeout(Duration::from_secs(10), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(frame))) => {
                    return frame.map_or(CloseCode::Status, |frame| frame.code)
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => panic!("Expected a close frame, got error: {err:?}"),
                None => panic!("Expected a close frame, stream ended"),
            }
        }
    })
    .await
    .expect("timeout waiting for close frame")
}

/// Assert nothing but keepalive traffic arrives within `window`.
pub async fn assert_silent(ws: &mut WsClient, window: Duration) {
    let deadline = time::Instant::now() + window;
    loop {
        match time::timeout_at(deadline, ws.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            Ok(other) => panic!("Expected silence, got: {other:?}"),
        }
    }
}
