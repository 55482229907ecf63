use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use sha2::{Digest, Sha256};
use std::convert::Infallible;
use std::net::SocketAddr;

// Heuristic client identity used as the quota ledger key.
// Clients behind one address with the same user agent share a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFingerprint(pub String);

// Create a fingerprint (hash of address + user agent)
pub fn make_fingerprint(address: &str, user_agent: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(address);
    hasher.update(user_agent);
    format!("{:x}", hasher.finalize())
}

// First X-Forwarded-For hop, then the socket peer, then "unknown"
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(addr), _) => addr.to_string(),
        (None, Some(peer)) => peer.ip().to_string(),
        (None, None) => "unknown".to_string(),
    }
}

impl<S> FromRequestParts<S> for ClientFingerprint
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let address = client_address(&parts.headers, peer);
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        Ok(Self(make_fingerprint(&address, user_agent)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_ua_sensitive() {
        let a = make_fingerprint("10.0.0.1", "curl/8.0");
        assert_eq!(a, make_fingerprint("10.0.0.1", "curl/8.0"));
        assert_ne!(a, make_fingerprint("10.0.0.1", "Mozilla/5.0"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn forwarded_header_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.2".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(client_address(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn falls_back_to_peer_then_unknown() {
        let headers = HeaderMap::new();
        let peer: SocketAddr = "192.168.1.9:4321".parse().unwrap();
        assert_eq!(client_address(&headers, Some(peer)), "192.168.1.9");
        assert_eq!(client_address(&headers, None), "unknown");
    }
}
