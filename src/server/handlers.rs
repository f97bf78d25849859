//! HTTP delivery handlers
//!
//! One fallback handler dispatches on [`Route`]: poll-once, event-stream
//! push, WebSocket push, or the static index/favicon.

use std::convert::Infallible;
use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{Html, IntoResponse, Response};
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::sync::oneshot;

use crate::broadcast::{Broadcaster, Subscription, Value};
use crate::server::push::{self, PushSink};
use crate::server::router::Route;

const INDEX_HTML: &str = include_str!("index.html");

const EVENT_STREAM: &str = "text/event-stream";

/// State shared by every request
#[derive(Clone)]
pub struct AppState {
    /// The broadcaster all routes read from
    pub broadcaster: Arc<Broadcaster>,
}

impl AppState {
    /// Create handler state around a broadcaster
    pub fn new(broadcaster: Arc<Broadcaster>) -> Self {
        Self { broadcaster }
    }
}

/// Fallback handler for every request
pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let route = Route::classify(request.uri().path(), request.headers());
    tracing::trace!(path = %request.uri().path(), route = ?route, "Routing request");

    match route {
        Route::SocketPush => socket_push(state, request).await,
        Route::EventStream => event_stream(&state),
        Route::PollOnce => poll_once(&state),
        Route::Index => Html(INDEX_HTML).into_response(),
        Route::Favicon => StatusCode::OK.into_response(),
    }
}

/// Format a value as one event-stream block
///
/// Line breaks in the value become separate `data:` lines, so the block
/// always ends at the blank line.
pub fn encode_event(value: &str) -> String {
    let mut block = String::with_capacity(value.len() + 8);
    for line in event_lines(value).split('\n') {
        block.push_str("data: ");
        block.push_str(line);
        block.push('\n');
    }
    block.push('\n');
    block
}

fn event_lines(value: &str) -> String {
    value.replace("\r\n", "\n").replace('\r', "\n")
}

fn poll_once(state: &AppState) -> Response {
    let value = state.broadcaster.current();
    ([(header::CONTENT_TYPE, EVENT_STREAM)], encode_event(value.as_str())).into_response()
}

fn event_stream(state: &AppState) -> Response {
    let subscription = match state.broadcaster.subscribe() {
        Ok(subscription) => subscription,
        Err(e) => return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    };

    tracing::debug!(client_id = %subscription.id(), "Event stream opened");

    // The subscription lives inside the body stream; when the client goes
    // away hyper drops the stream and the subscription with it.
    let events = futures::stream::unfold(subscription, |mut subscription| async move {
        let value = subscription.wait().await?;
        let event = Event::default().data(event_lines(value.as_str()));
        Some((Ok::<_, Infallible>(event), subscription))
    });

    Sse::new(events).into_response()
}

async fn socket_push(state: AppState, request: Request) -> Response {
    let (mut parts, _body) = request.into_parts();

    let upgrade = match WebSocketUpgrade::from_request_parts(&mut parts, &state).await {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let subscription = match state.broadcaster.subscribe() {
        Ok(subscription) => subscription,
        Err(e) => return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    };

    upgrade.on_upgrade(move |socket| serve_socket(socket, subscription))
}

async fn serve_socket(socket: WebSocket, subscription: Subscription) {
    let client_id = subscription.id();
    let (sender, mut receiver) = socket.split();
    let (closed_tx, closed_rx) = oneshot::channel();

    let reader = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {
                    tracing::trace!(client_id = %client_id, "Ignoring inbound WebSocket message");
                }
            }
        }
        let _ = closed_tx.send(());
    });

    let mut sink = SocketSink(sender);
    let end = push::run(subscription, &mut sink, closed_rx).await;

    reader.abort();
    let _ = sink.0.close().await;

    tracing::debug!(client_id = %client_id, reason = ?end, "WebSocket closed");
}

struct SocketSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl PushSink for SocketSink {
    async fn deliver(&mut self, value: &Value) -> io::Result<()> {
        self.0
            .send(Message::Binary(value.bytes().clone()))
            .await
            .map_err(io::Error::other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_event() {
        assert_eq!(encode_event("2024-01-01 00:00:00"), "data: 2024-01-01 00:00:00\n\n");
    }

    #[test]
    fn test_encode_event_multiline() {
        assert_eq!(encode_event("a\nb\r\nc\rd"), "data: a\ndata: b\ndata: c\ndata: d\n\n");
    }

    #[test]
    fn test_encode_event_empty() {
        assert_eq!(encode_event(""), "data: \n\n");
    }
}
