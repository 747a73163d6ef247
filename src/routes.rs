use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Request},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::any::Any;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::cache_headers;
use crate::client_ip::{self, ClientIp};
use crate::handlers::{self, AppState};

/// Build the application router with every route and middleware layer
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .route("/", get(handlers::index_handler))
        .route(
            "/upload",
            post(handlers::upload_handler).layer(DefaultBodyLimit::disable()),
        )
        .route("/uploads/", get(handlers::uploads_root_handler))
        .route("/uploads/*path", get(handlers::serve_upload_handler))
        .with_state(state);

    with_middleware(router)
}

/// Request id, client IP, access log, cache headers and panic recovery,
/// outermost first.
fn with_middleware(router: Router) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(middleware::from_fn(client_ip::resolve_client_ip))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(access_span)
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(middleware::from_fn(cache_headers::disable_caching))
            .layer(CatchPanicLayer::custom(handle_panic)),
    )
}

fn access_span(request: &Request<Body>) -> tracing::Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");
    let client_ip = request
        .extensions()
        .get::<ClientIp>()
        .map(|ClientIp(ip)| ip.to_string())
        .unwrap_or_else(|| "-".to_string());

    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
        client_ip = %client_ip,
    )
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        *s
    } else {
        "unknown panic payload"
    };
    tracing::error!(panic = %detail, "Handler panicked");

    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}
