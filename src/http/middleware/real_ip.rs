//! Client IP resolution middleware.
//! Attaches a [`ClientIp`] extension for the request logging middleware.

use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::http::context::ClientIp;

/// State required for client IP resolution.
#[derive(Clone, Copy, Debug, Default)]
pub struct RealIpState {
    /// Honour `X-Forwarded-For` / `X-Real-IP`. Only safe behind a trusted proxy.
    pub trust_forwarded_for: bool,
}

pub async fn real_ip_middleware(
    State(state): State<RealIpState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let forwarded = if state.trust_forwarded_for {
        forwarded_ip(req.headers())
    } else {
        None
    };

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if let Some(ip) = forwarded.or(peer) {
        req.extensions_mut().insert(ClientIp(ip));
    }

    next.run(req).await
}

/// First parseable address from `X-Forwarded-For`, then `X-Real-IP`.
pub fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let from_xff = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok());

    from_xff.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    })
}
