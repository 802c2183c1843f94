use std::any::Any;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::{catch_panic::CatchPanicLayer, set_header::SetResponseHeaderLayer};
use tracing::error;

mod error;
mod leads;
mod limits;

pub(crate) use error::HttpError;

use super::state::ServeState;
use crate::errors::SERVER_ERROR_MESSAGE;
use limits::{enforce_rate_limit, RateLimitGuard};

/// Request bodies above this size are refused with 413.
pub const MAX_BODY_BYTES: usize = 20 * 1024;

pub fn build_router(state: ServeState) -> Router {
    let read_guard = RateLimitGuard::new(state.read_limiter.clone(), state.trusted_hops);
    let cors = state.access.layer();

    // The write limit is checked inside the handler, after the body is parsed.
    let write_routes = Router::new()
        .route("/add-leads", post(leads::add_lead_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    let read_routes = Router::new()
        .route("/get-leads", get(leads::list_leads_handler))
        .route_layer(middleware::from_fn_with_state(read_guard, enforce_rate_limit));

    let router = Router::new()
        .route("/health", get(health_handler))
        .merge(write_routes)
        .merge(read_routes)
        .fallback(not_found_handler)
        .layer(cors);

    with_security_headers(router)
        .layer(CatchPanicLayer::custom(panic_response))
        .with_state(state)
}

fn with_security_headers(router: Router<ServeState>) -> Router<ServeState> {
    let headers: [(HeaderName, &'static str); 5] = [
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
        (header::REFERRER_POLICY, "no-referrer"),
        (
            HeaderName::from_static("cross-origin-resource-policy"),
            "same-origin",
        ),
        (header::X_DNS_PREFETCH_CONTROL, "off"),
    ];
    headers.into_iter().fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(
            name,
            HeaderValue::from_static(value),
        ))
    })
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn not_found_handler() -> HttpError {
    HttpError::new(StatusCode::NOT_FOUND, "Not found")
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload");
    error!(detail, "request handler panicked");
    HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_MESSAGE).into_response()
}
