use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::RETRY_AFTER, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::HttpError;
use crate::errors::LeadError;
use crate::server::client_addr::client_address;
use crate::server::rate_limit::{RateLimitDecision, RateLimiter};

const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");
const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

#[derive(Clone)]
pub(crate) struct RateLimitGuard {
    limiter: Arc<RateLimiter>,
    trusted_hops: usize,
}

impl RateLimitGuard {
    pub(crate) fn new(limiter: Arc<RateLimiter>, trusted_hops: usize) -> Self {
        Self {
            limiter,
            trusted_hops,
        }
    }

    /// Count one hit for the caller. A rejection comes back as the finished
    /// 429 response.
    pub(crate) fn admit(
        &self,
        headers: &HeaderMap,
        peer: Option<SocketAddr>,
    ) -> Result<RateLimitDecision, Response> {
        let client = client_address(headers, peer, self.trusted_hops);
        let decision = self.limiter.check(&client);
        if decision.allowed {
            return Ok(decision);
        }

        let kind = self.limiter.kind();
        debug!(%client, ?kind, "rate limit exceeded");
        let mut response = HttpError::from(LeadError::RateLimited {
            message: kind.rejection_message(),
        })
        .into_response();
        let headers = response.headers_mut();
        apply_rate_limit_headers(headers, &decision);
        headers.insert(RETRY_AFTER, HeaderValue::from(ceil_secs(decision.reset_after)));
        Err(response)
    }
}

pub(crate) async fn enforce_rate_limit(
    State(guard): State<RateLimitGuard>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let decision = match guard.admit(request.headers(), peer) {
        Ok(decision) => decision,
        Err(rejection) => return rejection,
    };

    let response = next.run(request).await;
    with_rate_limit_headers(response, &decision)
}

pub(crate) fn with_rate_limit_headers(
    mut response: Response,
    decision: &RateLimitDecision,
) -> Response {
    apply_rate_limit_headers(response.headers_mut(), decision);
    response
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    let policy = format!("{};w={}", decision.limit, decision.window.as_secs());
    if let Ok(value) = HeaderValue::from_str(&policy) {
        headers.insert(RATELIMIT_POLICY, value);
    }
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(
        RATELIMIT_RESET,
        HeaderValue::from(ceil_secs(decision.reset_after)),
    );
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}
