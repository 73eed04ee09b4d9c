//! Audit-trail ingestion middleware.
//!
//! Layered over the full route tree. Every completed exchange is run through
//! the classification chain in `mdc_core::classify`; exchanges that match a
//! rule are appended to the event record store with whatever request context
//! is available. The actor is decoded from the bearer token alone -- no
//! database round trip -- and is absent when the token is missing or invalid,
//! which is exactly right for failed logins.
//!
//! Append failures must never break the request: they are logged at `warn`
//! and the response is returned unchanged.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use mdc_core::classify::{classify, Exchange};
use mdc_core::subject::SubjectKind;
use mdc_db::models::event_record::CreateEventRecord;
use mdc_db::repositories::EventRecordRepo;

use super::auth::{bearer_claims, RequestMeta};
use crate::state::AppState;

/// Classify the finished exchange and append an audit record when a rule
/// matches.
pub async fn audit_trail(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let meta = RequestMeta::from_headers(request.headers());
    let claims = bearer_claims(request.headers(), &state.config.jwt);

    let response = next.run(request).await;

    let exchange = Exchange {
        method: method.as_str(),
        path: &path,
        status: response.status().as_u16(),
    };
    let Some(action) = classify(&exchange) else {
        return response;
    };

    let mut record = CreateEventRecord::new(action)
        .with_subject_kind(SubjectKind::Request)
        .with_description(format!("{method} {path}"))
        .with_client(meta.ip_address, meta.user_agent)
        .with_http(method.as_str(), &path, exchange.status);
    if let Some(claims) = claims {
        record = record.with_actor(claims.sub).with_session(claims.jti);
    }

    if let Err(e) = EventRecordRepo::append(&state.pool, &record).await {
        tracing::warn!(
            error = %e,
            action = %action,
            path = %path,
            "audit trail append failed"
        );
    }

    response
}
