// ============================
// crates/backend-lib/src/handlers/mod.rs
// ============================
//! Request handlers for the REST and live gateways.

pub mod live;
pub mod polls;

use axum::http::{header, HeaderMap};

use crate::identity::{first_forwarded_for, session_from_cookie_header, IdentityHints};

/// Identity hints for the stateless HTTP path:
/// `sessionId` cookie, forwarded address, peer address (`x-real-ip`,
/// stamped by the reverse proxy).
pub(crate) fn http_identity_hints(headers: &HeaderMap) -> IdentityHints {
    IdentityHints {
        session_token: headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(session_from_cookie_header)
            .map(String::from),
        forwarded_for: headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(first_forwarded_for)
            .map(String::from),
        peer_addr: headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(String::from),
        connection_id: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::resolve_voter_identity;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_outranks_forwarded_and_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; sessionId=sess-9"),
        );
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("127.0.0.1"));

        let hints = http_identity_hints(&headers);
        assert_eq!(resolve_voter_identity(&hints), "sess-9");
    }

    #[test]
    fn falls_through_to_peer_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("192.0.2.4"));
        let hints = http_identity_hints(&headers);
        assert_eq!(resolve_voter_identity(&hints), "192.0.2.4");
    }

    #[test]
    fn bare_request_resolves_to_unknown() {
        let hints = http_identity_hints(&HeaderMap::new());
        assert_eq!(resolve_voter_identity(&hints), "unknown");
    }
}
