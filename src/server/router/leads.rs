use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    async_trait,
    body::Bytes,
    extract::{ConnectInfo, FromRequest, Request, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, map::Entry, Map, Value};
use tracing::{debug, info, instrument};

use super::limits::{with_rate_limit_headers, RateLimitGuard};
use super::HttpError;
use crate::errors::LeadError;
use crate::server::state::ServeState;
use crate::validation::validate_lead;

/// Lead submission body, JSON or URL-encoded. Any other content type is
/// read as an empty object and fails validation like a blank form.
pub(crate) struct LeadPayload(pub(crate) Value);

#[async_trait]
impl<S> FromRequest<S> for LeadPayload
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let kind = BodyKind::of(&request);
        let bytes = Bytes::from_request(request, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                HttpError::new(StatusCode::PAYLOAD_TOO_LARGE, "Payload too large")
            } else {
                HttpError::bad_request("Invalid request body")
            }
        })?;

        let value = match kind {
            _ if bytes.is_empty() => Value::Object(Map::new()),
            BodyKind::Json => serde_json::from_slice(&bytes).map_err(|err| {
                debug!(%err, "unparseable JSON body");
                HttpError::bad_request("Invalid request body")
            })?,
            BodyKind::Form => parse_form(&bytes),
            BodyKind::Other => Value::Object(Map::new()),
        };
        Ok(Self(value))
    }
}

enum BodyKind {
    Json,
    Form,
    Other,
}

impl BodyKind {
    fn of(request: &Request) -> Self {
        let content_type = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|mime| mime.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if content_type == "application/json" || content_type.ends_with("+json") {
            BodyKind::Json
        } else if content_type == "application/x-www-form-urlencoded" {
            BodyKind::Form
        } else {
            BodyKind::Other
        }
    }
}

/// Repeated keys collect into an array, in order.
fn parse_form(bytes: &[u8]) -> Value {
    let mut fields = Map::new();
    for (key, value) in url::form_urlencoded::parse(bytes) {
        let value = Value::String(value.into_owned());
        match fields.entry(key.into_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::Array(items) => items.push(value),
                existing => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
            },
        }
    }
    Value::Object(fields)
}

/// The write limit is counted only once the body has been read and parsed;
/// oversized and unparseable bodies are refused by [`LeadPayload`] first.
#[instrument(skip_all, fields(request_id = %new_request_id()))]
pub(crate) async fn add_lead_handler(
    State(state): State<ServeState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    LeadPayload(body): LeadPayload,
) -> Response {
    let guard = RateLimitGuard::new(Arc::clone(&state.write_limiter), state.trusted_hops);
    let decision = match guard.admit(&headers, peer.map(|ConnectInfo(addr)| addr)) {
        Ok(decision) => decision,
        Err(rejection) => return rejection,
    };

    with_rate_limit_headers(capture_lead(&state, &body).await, &decision)
}

async fn capture_lead(state: &ServeState, body: &Value) -> Response {
    let lead = match validate_lead(body) {
        Ok(lead) => lead,
        Err(rejection) => {
            debug!(reason = rejection.message(), "lead rejected");
            return HttpError::from(LeadError::from(rejection)).into_response();
        }
    };

    match state.store.insert(lead).await {
        Ok(inserted_id) => {
            info!(%inserted_id, "lead captured");
            (
                StatusCode::CREATED,
                Json(json!({ "insertedId": inserted_id })),
            )
                .into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

#[instrument(skip_all, fields(request_id = %new_request_id()))]
pub(crate) async fn list_leads_handler(State(state): State<ServeState>) -> Response {
    match state.store.list_newest_first().await {
        Ok(leads) => {
            debug!(count = leads.len(), "leads listed");
            Json(leads).into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_bodies_decode_into_fields() {
        let value = parse_form(b"name=Asha+K&phone=%2B91+9538752960&message=3BHK%3F");
        assert_eq!(value["name"], "Asha K");
        assert_eq!(value["phone"], "+91 9538752960");
        assert_eq!(value["message"], "3BHK?");
    }

    #[test]
    fn repeated_form_keys_become_arrays() {
        let value = parse_form(b"name=a&name=b&name=c");
        assert_eq!(value["name"], json!(["a", "b", "c"]));
    }
}
