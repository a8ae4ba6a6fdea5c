//! Client IP extraction
//!
//! The socket peer address is the default source of truth. Forwarding
//! headers (`X-Forwarded-For`, `X-Real-IP`) are spoofable by any client, so
//! they are honored only when the deployment declares a trusted proxy in
//! front of the service.

use std::net::SocketAddr;

use axum::http::HeaderMap;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Resolve the client address for gate evaluation.
///
/// Returns a string rather than a parsed address: the gate validates it as
/// part of input validation, and a proxy sending garbage should surface as a
/// malformed request, not a panic path.
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr, trusted_proxy: bool) -> String {
    if trusted_proxy {
        // Leftmost entry is the original client; later hops append
        if let Some(forwarded) = headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }

        if let Some(real_ip) = headers.get(X_REAL_IP).and_then(|v| v.to_str().ok()) {
            let real_ip = real_ip.trim();
            if !real_ip.is_empty() {
                return real_ip.to_string();
            }
        }
    }

    peer.ip().to_string()
}
