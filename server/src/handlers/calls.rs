use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use loancall::{CallAnalysis, CallJob, CallStatus, ProcessOutcome};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{parse_body, required, ApiError};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessCallRequest {
    #[serde(default)]
    call_id: Option<String>,
}

#[derive(Serialize)]
struct ProcessCallResponse {
    success: bool,
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<CallAnalysis>,
}

/// `POST /functions/v1/process-call`
pub async fn process_call(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: ProcessCallRequest = parse_body(&body)?;
    let call_id = required(request.call_id, "Call ID is required")?;

    let outcome = state.pipeline.run(&call_id).await.map_err(|e| {
        ApiError::internal(format!("Error processing call: {}", e)).with_kind(Some(e.kind()))
    })?;

    if outcome.is_in_flight() {
        info!(call_id = %call_id, "Call already in flight");
        let body = ProcessCallResponse {
            success: true,
            message: "Call is already being processed",
            transcript: None,
            analysis: None,
        };
        return Ok((StatusCode::ACCEPTED, Json(body)).into_response());
    }

    completion(outcome)
}

fn completion(outcome: ProcessOutcome) -> Result<Response, ApiError> {
    let call: CallJob = outcome.into_call();
    if call.status != CallStatus::Completed {
        let cause = call.error.as_deref().unwrap_or("unknown error");
        return Err(
            ApiError::internal(format!("Error processing call: {}", cause)).with_kind(call.error_kind)
        );
    }

    let analysis = call.analysis();
    let body = ProcessCallResponse {
        success: true,
        message: "Call processed successfully",
        transcript: call.transcript,
        analysis,
    };
    Ok(Json(body).into_response())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::Utc;
    use loancall::ai::{AdapterError, MockExtractor, MockTranscriber};
    use loancall::db::Lease;
    use loancall::model::NewCall;
    use loancall::{ArtifactStore, CallJob, CallStore};
    use serde_json::json;

    use super::super::test_support::{analysis, post_json, TestApp};

    const URI: &str = "/functions/v1/process-call";

    async fn stored_call(app: &TestApp) -> CallJob {
        app.artifacts
            .put("calls/1700000000000-0a1b2c3d.webm", b"audio")
            .await
            .unwrap();
        let call = CallJob::new(NewCall {
            user_id: "u1".to_string(),
            title: "Intro".to_string(),
            client_name: "Dana Whitfield".to_string(),
            audio_url: app.artifacts.url_for("calls/1700000000000-0a1b2c3d.webm"),
            duration_secs: 30,
        });
        app.db.insert_call(&call).unwrap();
        call
    }

    #[tokio::test]
    async fn test_missing_call_id() {
        let app = TestApp::new(MockTranscriber::new(), MockExtractor::new());
        let (status, body) = app.send(post_json(URI, json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Call ID is required");
    }

    #[tokio::test]
    async fn test_invalid_body() {
        let app = TestApp::new(MockTranscriber::new(), MockExtractor::new());
        let request = axum::http::Request::post(URI)
            .body(axum::body::Body::from("{not json"))
            .unwrap();
        let (status, body) = app.send(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn test_completion_and_repeat() {
        let app = TestApp::new(
            MockTranscriber::new().with_response("We talked about a loan."),
            MockExtractor::new().with_analysis(analysis()),
        );
        let call = stored_call(&app).await;

        let (status, body) = app.send(post_json(URI, json!({"callId": call.id}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["transcript"], "We talked about a loan.");
        assert_eq!(body["analysis"]["loan_info"]["loan_amount"], 450000.0);

        let (status, again) = app.send(post_json(URI, json!({"callId": call.id}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(again, body);
    }

    #[tokio::test]
    async fn test_unknown_call() {
        let app = TestApp::new(MockTranscriber::new(), MockExtractor::new());
        let (status, body) = app.send(post_json(URI, json!({"callId": "nope"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["errorKind"], "JobNotFound");
    }

    #[tokio::test]
    async fn test_failed_processing() {
        let app = TestApp::new(
            MockTranscriber::new().with_failure(AdapterError::Status {
                status: 500,
                body: "boom".to_string(),
            }),
            MockExtractor::new(),
        );
        let call = stored_call(&app).await;

        let (status, body) = app.send(post_json(URI, json!({"callId": call.id}))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["errorKind"], "TranscriptionFailed");
        assert!(body["error"].as_str().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_in_flight() {
        let app = TestApp::new(MockTranscriber::new(), MockExtractor::new());
        let call = stored_call(&app).await;
        let now = Utc::now();
        app.db
            .claim_call(
                &call.id,
                &Lease {
                    token: "elsewhere".to_string(),
                    now,
                    lease_cutoff: now - chrono::Duration::minutes(15),
                },
            )
            .unwrap();

        let (status, body) = app.send(post_json(URI, json!({"callId": call.id}))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["success"], true);
    }
}
