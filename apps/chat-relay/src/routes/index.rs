//! Landing page with a minimal browser chat client.

use axum::extract::{OriginalUri, State};
use axum::http::header::HOST;
use axum::http::{HeaderMap, Uri};
use axum::routing::get;
use axum::Router;
use maud::{html, Markup, PreEscaped, DOCTYPE};

use crate::AppState;

const CHAT_PATH: &str = "/chat";

const CLIENT_SCRIPT: &str = r##"
$(function () {
    var $messages = $("#messages"),
        $send = $("#send"),
        $message = $("#message"),
        connection = new WebSocket(__WS_URL__);

    $send.prop("disabled", true);

    var send = function () {
        var text = $message.val();
        if (!text) {
            return;
        }
        $message.val("");
        connection.send(text);
    };

    connection.onopen = function () {
        $send.prop("disabled", false);
        $messages.prepend($("<li class=\"bg-info\" style=\"font-size: 1.5em\">Connected</li>"));
        $send.on('click', send);
        $message.keypress(function(event){
            var keycode = (event.keyCode ? event.keyCode : event.which);
            if (keycode == '13') {
                send();
            }
        });
    };
    connection.onerror = function (error) {
        console.log('WebSocket Error ', error);
    };
    connection.onclose = function () {
        $send.prop("disabled", true);
        $messages.append($("<li class=\"bg-danger\" style=\"font-size: 1.5em\">Disconnected</li>"));
    };
    connection.onmessage = function (event) {
        $messages.append($("<li style=\"font-size: 1.5em\"></li>").text(event.data));
    };
});
"##;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

async fn index(
    State(state): State<AppState>,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
) -> Markup {
    render_index(&websocket_url(&headers, &uri, state.config.port))
}

/// Build the chat endpoint URL as the browser should reach it: `wss` when
/// the request came in over TLS (directly or behind a proxy), `ws`
/// otherwise, on whatever host the browser used.
pub fn websocket_url(headers: &HeaderMap, uri: &Uri, port: u16) -> String {
    let forwarded_https = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"));
    let secure = forwarded_https || uri.scheme_str() == Some("https");
    let scheme = if secure { "wss" } else { "ws" };

    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.trim().is_empty())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_else(|| format!("localhost:{port}"));

    format!("{scheme}://{host}{CHAT_PATH}")
}

/// Render the landing page for a given websocket URL.
pub fn render_index(ws_url: &str) -> Markup {
    let script = CLIENT_SCRIPT.replace("__WS_URL__", &js_string_literal(ws_url));

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "Chat Room" }
                link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@3.4.1/dist/css/bootstrap.min.css";
                link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap@3.4.1/dist/css/bootstrap-theme.min.css";
                script src="https://code.jquery.com/jquery-1.11.1.min.js" {}
            }
            body {
                div class="container" {
                    h1 { "Chat Room" }
                    div class="row" {
                        div class="col-md-12" {
                            ul id="messages" class="list-unstyled" {}
                        }
                    }
                    div class="row" {
                        div class="col-md-10" {
                            input type="text" id="message" class="form-control input-lg"
                                placeholder="Say something" autocomplete="off";
                        }
                        div class="col-md-2" {
                            button id="send" class="btn btn-primary btn-lg btn-block" disabled { "Send" }
                        }
                    }
                }
                script { (PreEscaped(script)) }
            }
        }
    }
}

/// Quote `value` as a JavaScript string literal that is also safe inside an
/// HTML `<script>` element.
fn js_string_literal(value: &str) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/")
}
