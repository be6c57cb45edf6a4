use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use loancall::{WebhookError, WebhookOutcome};
use serde_json::{json, Value};
use tracing::debug;

use super::{ApiError, STRIPE_SIGNATURE};
use crate::state::AppState;

/// `POST /functions/v1/stripe-webhook`. The body is verified byte-for-byte,
/// so it is taken raw rather than through a JSON extractor.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers
        .get(STRIPE_SIGNATURE)
        .and_then(|value| value.to_str().ok());

    let outcome = state
        .billing
        .handle(signature, &body)
        .map_err(webhook_error)?;
    if let WebhookOutcome::Ignored { event_type } = &outcome {
        debug!(event_type = %event_type, "Webhook event ignored");
    }

    Ok(Json(json!({ "received": true })))
}

fn webhook_error(e: WebhookError) -> ApiError {
    let kind = e.kind();
    let error = match &e {
        WebhookError::MissingSignature
        | WebhookError::InvalidSignature(_)
        | WebhookError::MalformedEvent(_) => ApiError::bad_request(e.to_string()),
        WebhookError::SecretNotConfigured | WebhookError::Store(_) => {
            ApiError::internal(format!("Error processing webhook: {}", e))
        }
    };
    error.with_kind(kind)
}
