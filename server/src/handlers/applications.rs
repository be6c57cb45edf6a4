use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{parse_body, required, ApiError};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PushRequest {
    #[serde(default)]
    application_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushResponse {
    success: bool,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    encompass_id: Option<String>,
}

/// `POST /functions/v1/encompass-push`
pub async fn encompass_push(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: PushRequest = parse_body(&body)?;
    let application_id = required(request.application_id, "Application ID is required")?;

    let outcome = match state.pusher.push(&application_id).await {
        Ok(outcome) => outcome,
        Err(e) if e.is_in_flight() => {
            info!(application_id = %application_id, "Push already in flight");
            let body = PushResponse {
                success: true,
                message: "Push to Encompass already in progress",
                encompass_id: None,
            };
            return Ok((StatusCode::ACCEPTED, Json(body)).into_response());
        }
        Err(e) => {
            return Err(ApiError::internal(format!("Error pushing to Encompass: {}", e))
                .with_kind(Some(e.kind())))
        }
    };

    Ok(Json(PushResponse {
        success: true,
        message: "Application successfully pushed to Encompass",
        encompass_id: Some(outcome.encompass_id),
    })
    .into_response())
}
