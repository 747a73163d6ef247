use axum::{
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::{IpAddr, SocketAddr};

/// Address of the client that sent the request, as resolved from proxy
/// headers or the TCP peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Middleware that stores the resolved [`ClientIp`] in the request extensions
pub async fn resolve_client_ip(mut request: Request, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    if let Some(ip) = forwarded_ip(request.headers()).or(peer) {
        request.extensions_mut().insert(ClientIp(ip));
    }

    next.run(request).await
}

/// `True-Client-IP`, then `X-Real-IP`, then the first `X-Forwarded-For` hop.
fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    header("true-client-ip")
        .or_else(|| header("x-real-ip"))
        .or_else(|| header("x-forwarded-for").and_then(|list| list.split(',').next()))
        .and_then(|ip| ip.trim().parse().ok())
}
