//! Conversion of axum requests into [`InboundRequest`].
//!
//! # Responsibilities
//! - Flatten headers into a string map (duplicate names joined with ", ")
//! - Decode the query string
//! - Carry the body as UTF-8 text, or base64 when it is not valid UTF-8
//! - Resolve the client address from `X-Forwarded-For`, else the peer

use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::http::{header, request::Parts, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::config::ListenerConfig;
use crate::ingest::event::InboundRequest;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Build the dispatcher's view of one HTTP request.
pub fn inbound_request(
    parts: &Parts,
    body: &[u8],
    peer: Option<SocketAddr>,
    listener: &ListenerConfig,
) -> InboundRequest {
    let (body, is_base64_encoded) = encode_body(body);
    let domain = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| listener.domain.clone());

    InboundRequest {
        method: Some(parts.method.as_str().to_string()),
        path: Some(parts.uri.path().to_string()),
        headers: flatten_headers(&parts.headers),
        query_parameters: parts.uri.query().map(parse_query).unwrap_or_default(),
        body,
        is_base64_encoded,
        source_ip: client_ip(&parts.headers, peer),
        domain,
        stage: listener.stage.clone(),
    }
}

pub fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    flat
}

/// Later duplicates win.
pub fn parse_query(query: &str) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

fn encode_body(body: &[u8]) -> (Option<String>, bool) {
    if body.is_empty() {
        return (None, false);
    }
    match std::str::from_utf8(body) {
        Ok(text) => (Some(text.to_string()), false),
        Err(_) => (Some(STANDARD.encode(body)), true),
    }
}

fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn test_converts_request() {
        let parts = parts(
            Request::post("/messages/telegram?chat=42&lang=en%20US")
                .header("Host", "hooks.example.com")
                .header("X-Correlation-ID", "test-123")
                .header("Accept", "text/plain")
                .header("Accept", "application/json")
                .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
                .body(())
                .unwrap(),
        );
        let peer: SocketAddr = "10.0.0.2:5555".parse().unwrap();
        let listener = ListenerConfig::default();
        let inbound = inbound_request(&parts, br#"{"a":1}"#, Some(peer), &listener);

        assert_eq!(inbound.method.as_deref(), Some("POST"));
        assert_eq!(inbound.path.as_deref(), Some("/messages/telegram"));
        assert_eq!(inbound.headers["x-correlation-id"], "test-123");
        assert_eq!(inbound.headers["accept"], "text/plain, application/json");
        assert_eq!(inbound.query_parameters["chat"], "42");
        assert_eq!(inbound.query_parameters["lang"], "en US");
        assert_eq!(inbound.body.as_deref(), Some(r#"{"a":1}"#));
        assert!(!inbound.is_base64_encoded);
        assert_eq!(inbound.source_ip.as_deref(), Some("203.0.113.7"));
        assert_eq!(inbound.domain.as_deref(), Some("hooks.example.com"));
    }

    #[test]
    fn test_binary_body_is_base64() {
        let parts = parts(Request::put("/upload").body(()).unwrap());
        let listener = ListenerConfig::default();
        let inbound = inbound_request(&parts, &[0xff, 0xfe, 0x00], None, &listener);

        assert!(inbound.is_base64_encoded);
        assert_eq!(inbound.body.as_deref(), Some("//4A"));
        assert!(inbound.source_ip.is_none());
    }

    #[test]
    fn test_binary_body_that_encodes_to_json_stays_text() {
        use crate::ingest::event::{ContentType, Event};

        let parts = parts(Request::post("/upload").body(()).unwrap());
        let listener = ListenerConfig::default();
        let inbound = inbound_request(&parts, &[0xd7, 0x6d, 0xf8], None, &listener);
        assert_eq!(inbound.body.as_deref(), Some("1234"));

        let event = Event::from_request(&inbound);
        assert!(event.is_base64_encoded);
        assert_eq!(event.content_type, ContentType::Text);
        assert_eq!(event.payload, serde_json::json!("1234"));
    }

    #[test]
    fn test_fallbacks() {
        let listener = ListenerConfig {
            domain: Some("api.example.com".into()),
            stage: Some("prod".into()),
            ..Default::default()
        };
        let parts = parts(Request::patch("/").body(()).unwrap());
        let peer: SocketAddr = "192.0.2.10:443".parse().unwrap();
        let inbound = inbound_request(&parts, b"", Some(peer), &listener);

        assert!(inbound.body.is_none());
        assert!(inbound.query_parameters.is_empty());
        assert_eq!(inbound.source_ip.as_deref(), Some("192.0.2.10"));
        assert_eq!(inbound.domain.as_deref(), Some("api.example.com"));
        assert_eq!(inbound.stage.as_deref(), Some("prod"));
    }
}
