//! Browser origin policy.
//!
//! [`AccessPolicy::decide`] is the whole rule set. The CORS layer asks it
//! about every request that carries an `Origin`; a denial only means the
//! grant headers are left off. Preflights are still answered so the browser
//! can see the refusal itself.

use std::sync::Arc;

use axum::http::{header::CONTENT_TYPE, request::Parts, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessVerdict {
    Granted,
    Denied,
}

impl AccessVerdict {
    pub fn is_granted(self) -> bool {
        matches!(self, AccessVerdict::Granted)
    }
}

#[derive(Clone, Debug, Default)]
pub struct AccessPolicy {
    allowed_origins: Arc<Vec<String>>,
}

impl AccessPolicy {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_origins = origins
            .into_iter()
            .map(|origin| origin.as_ref().trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();
        Self {
            allowed_origins: Arc::new(allowed_origins),
        }
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    /// Callers without an `Origin` header (servers, curl, health checkers)
    /// are always let through. Browsers must come from a listed origin.
    pub fn decide(&self, origin: Option<&str>) -> AccessVerdict {
        match origin {
            None => AccessVerdict::Granted,
            Some(origin) if self.allowed_origins.iter().any(|allowed| allowed == origin) => {
                AccessVerdict::Granted
            }
            Some(_) => AccessVerdict::Denied,
        }
    }

    /// GET, POST and OPTIONS; `Content-Type` is the only request header a
    /// page may send. Credentials are never allowed.
    pub fn layer(&self) -> CorsLayer {
        let policy = self.clone();
        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(
                move |origin: &HeaderValue, _parts: &Parts| {
                    let verdict = match origin.to_str() {
                        Ok(origin) => policy.decide(Some(origin)),
                        Err(_) => AccessVerdict::Denied,
                    };
                    if !verdict.is_granted() {
                        debug!(?origin, "cross-origin request from unlisted origin");
                    }
                    verdict.is_granted()
                },
            ))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE])
            .allow_credentials(false)
    }
}
