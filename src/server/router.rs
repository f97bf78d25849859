//! Header-based request routing
//!
//! Every request lands on one fallback handler; the route is chosen from the
//! `Upgrade` and `Accept` headers first and the path second, so a streaming
//! request to `/` still subscribes instead of getting the index page.

use axum::http::{header, HeaderMap};

/// Path of the static index page
pub const INDEX_PATH: &str = "/";

/// Path of the favicon
pub const FAVICON_PATH: &str = "/favicon.ico";

const EVENT_STREAM: &str = "text/event-stream";
const WEBSOCKET: &str = "websocket";

/// Where a request is dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// WebSocket upgrade, push the value on every wake
    SocketPush,
    /// `text/event-stream`, push the value on every wake
    EventStream,
    /// Return the current value once
    PollOnce,
    /// Static index document
    Index,
    /// Empty favicon
    Favicon,
}

impl Route {
    /// Select the route for a request
    pub fn classify(path: &str, headers: &HeaderMap) -> Self {
        if is_websocket_upgrade(headers) {
            return Route::SocketPush;
        }
        if accepts_event_stream(headers) {
            return Route::EventStream;
        }

        match path {
            INDEX_PATH => Route::Index,
            FAVICON_PATH => Route::Favicon,
            _ => Route::PollOnce,
        }
    }
}

/// First `Upgrade` token is `websocket`
fn is_websocket_upgrade(headers: &HeaderMap) -> bool {
    first_item(headers, header::UPGRADE).is_some_and(|token| token.eq_ignore_ascii_case(WEBSOCKET))
}

/// Preferred (first) `Accept` media range is `text/event-stream`
fn accepts_event_stream(headers: &HeaderMap) -> bool {
    first_item(headers, header::ACCEPT).is_some_and(|range| {
        let media_type = range.split(';').next().unwrap_or_default().trim();
        media_type.eq_ignore_ascii_case(EVENT_STREAM)
    })
}

fn first_item(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    let value = headers.get(name)?.to_str().ok()?;
    value.split(',').next().map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_plain_requests() {
        let none = HeaderMap::new();

        assert_eq!(Route::classify("/", &none), Route::Index);
        assert_eq!(Route::classify("/favicon.ico", &none), Route::Favicon);
        assert_eq!(Route::classify("/once", &none), Route::PollOnce);
        assert_eq!(Route::classify("/anything/else", &none), Route::PollOnce);
    }

    #[test]
    fn test_event_stream() {
        let accept = headers(&[(header::ACCEPT, "text/event-stream")]);

        assert_eq!(Route::classify("/events", &accept), Route::EventStream);
    }

    #[test]
    fn test_event_stream_must_be_preferred() {
        let second = headers(&[(header::ACCEPT, "text/html, text/event-stream")]);
        let with_params = headers(&[(header::ACCEPT, "Text/Event-Stream;q=1.0, */*")]);

        assert_eq!(Route::classify("/x", &second), Route::PollOnce);
        assert_eq!(Route::classify("/x", &with_params), Route::EventStream);
    }

    #[test]
    fn test_websocket_upgrade() {
        let upgrade = headers(&[(header::UPGRADE, "WebSocket")]);
        let other = headers(&[(header::UPGRADE, "h2c")]);

        assert_eq!(Route::classify("/ws", &upgrade), Route::SocketPush);
        assert_eq!(Route::classify("/ws", &other), Route::PollOnce);
    }

    #[test]
    fn test_streaming_beats_static_paths() {
        let accept = headers(&[(header::ACCEPT, "text/event-stream")]);
        let upgrade = headers(&[(header::UPGRADE, "websocket")]);

        assert_eq!(Route::classify("/", &accept), Route::EventStream);
        assert_eq!(Route::classify("/favicon.ico", &accept), Route::EventStream);
        assert_eq!(Route::classify("/", &upgrade), Route::SocketPush);
        assert_eq!(Route::classify("/favicon.ico", &upgrade), Route::SocketPush);
    }

    #[test]
    fn test_upgrade_beats_event_stream() {
        let both = headers(&[
            (header::UPGRADE, "websocket"),
            (header::ACCEPT, "text/event-stream"),
        ]);

        assert_eq!(Route::classify("/", &both), Route::SocketPush);
    }
}
