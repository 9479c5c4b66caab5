//! Access Control Middleware.
//! Enforces the IP allow-list before any handler runs.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::security::ip_filter::IpFilter;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Client address attached to admitted requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientAddr {
    pub ip: IpAddr,
    /// Taken from a forwarding header rather than the socket.
    pub forwarded: bool,
}

/// Resolve the client address of a request.
///
/// With `trust_proxy`, a forwarding header wins over the peer address.
/// `X-Forwarded-For` is consulted first; a blank one defers to `X-Real-Ip`.
/// A forwarding header that is unreadable or does not hold an address
/// yields `None`.
pub fn client_addr(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy: bool,
) -> Option<ClientAddr> {
    if trust_proxy {
        for name in [X_FORWARDED_FOR, X_REAL_IP] {
            let Some(value) = headers.get(name) else {
                continue;
            };
            let value = value.to_str().ok()?;
            if value.trim().is_empty() {
                continue;
            }
            let first = value.split(',').next().unwrap_or_default().trim();
            return first.parse::<IpAddr>().ok().map(|ip| ClientAddr {
                ip: ip.to_canonical(),
                forwarded: true,
            });
        }
    }

    peer.map(|addr| ClientAddr {
        ip: addr.ip().to_canonical(),
        forwarded: false,
    })
}

pub async fn ip_filter_middleware(
    State(filter): State<Arc<IpFilter>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    match client_addr(req.headers(), Some(peer), filter.trust_proxy()) {
        Some(client) if filter.allowed(client.ip) => {
            req.extensions_mut().insert(client);
            next.run(req).await
        }
        client => {
            tracing::warn!(
                client_ip = ?client.map(|c| c.ip),
                peer = %peer,
                path = %req.uri().path(),
                "Blocked request"
            );
            (StatusCode::FORBIDDEN, "Forbidden").into_response()
        }
    }
}
