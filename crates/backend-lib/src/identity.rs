// ============================
// crates/backend-lib/src/identity.rs
// ============================
//! Voter identity resolution.
//!
//! A voter identity is an opaque string derived from transport metadata in a
//! fixed precedence order: explicit session token, forwarded address, peer
//! address, connection id. Resolution is pure and never fails; the stateless
//! HTTP path falls back to a sentinel when nothing at all is present.

/// Sentinel identity for requests carrying no usable metadata.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Transport hints available when a request or connection arrives.
///
/// Fields are ordered by precedence; the first non-empty one wins.
#[derive(Debug, Default, Clone)]
pub struct IdentityHints {
    /// Explicit session token (cookie on HTTP, query parameter on upgrade)
    pub session_token: Option<String>,
    /// First hop of an `x-forwarded-for` header
    pub forwarded_for: Option<String>,
    /// Peer socket address
    pub peer_addr: Option<String>,
    /// Server-assigned connection id (live channel only)
    pub connection_id: Option<String>,
}

/// Resolve a stable voter identity from transport hints.
pub fn resolve_voter_identity(hints: &IdentityHints) -> String {
    [
        hints.session_token.as_deref(),
        hints.forwarded_for.as_deref(),
        hints.peer_addr.as_deref(),
        hints.connection_id.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|v| !v.is_empty())
    .unwrap_or(UNKNOWN_IDENTITY)
    .to_string()
}

/// Extract the `sessionId` value from a `Cookie` header, if present.
pub fn session_from_cookie_header(header: &str) -> Option<&str> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix("sessionId="))
        .filter(|v| !v.is_empty())
}

/// First address of an `x-forwarded-for` header, if present.
pub fn first_forwarded_for(header: &str) -> Option<&str> {
    header
        .split(',')
        .map(str::trim)
        .find(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_wins() {
        let hints = IdentityHints {
            session_token: Some("sess-123".to_string()),
            forwarded_for: Some("10.0.0.1".to_string()),
            peer_addr: Some("127.0.0.1:9000".to_string()),
            connection_id: Some("conn-1".to_string()),
        };
        assert_eq!(resolve_voter_identity(&hints), "sess-123");
    }

    #[test]
    fn forwarded_address_beats_peer_addr() {
        let hints = IdentityHints {
            session_token: None,
            forwarded_for: Some("10.0.0.1".to_string()),
            peer_addr: Some("127.0.0.1:9000".to_string()),
            connection_id: None,
        };
        assert_eq!(resolve_voter_identity(&hints), "10.0.0.1");
    }

    #[test]
    fn empty_hints_are_skipped() {
        let hints = IdentityHints {
            session_token: Some(String::new()),
            forwarded_for: Some("   ".to_string()),
            peer_addr: Some("127.0.0.1:9000".to_string()),
            connection_id: None,
        };
        assert_eq!(resolve_voter_identity(&hints), "127.0.0.1:9000");
    }

    #[test]
    fn connection_id_is_last_resort() {
        let hints = IdentityHints {
            connection_id: Some("conn-42".to_string()),
            ..IdentityHints::default()
        };
        assert_eq!(resolve_voter_identity(&hints), "conn-42");
    }

    #[test]
    fn nothing_present_yields_sentinel() {
        assert_eq!(
            resolve_voter_identity(&IdentityHints::default()),
            UNKNOWN_IDENTITY
        );
    }

    #[test]
    fn cookie_header_parsing() {
        assert_eq!(
            session_from_cookie_header("sessionId=abc123; theme=dark"),
            Some("abc123")
        );
        assert_eq!(
            session_from_cookie_header("theme=dark; sessionId=abc123"),
            Some("abc123")
        );
        assert_eq!(session_from_cookie_header("theme=dark"), None);
        assert_eq!(session_from_cookie_header("sessionId="), None);
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        assert_eq!(
            first_forwarded_for("203.0.113.7, 70.41.3.18, 150.172.238.178"),
            Some("203.0.113.7")
        );
        assert_eq!(first_forwarded_for(""), None);
    }
}
