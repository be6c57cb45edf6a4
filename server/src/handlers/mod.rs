//! HTTP edge functions.
//!
//! Every error body is `{"error": "..."}`; failures from the core flows add
//! `errorKind` with the taxonomy tag.

pub mod applications;
pub mod billing;
pub mod calls;

use axum::body::Bytes;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use loancall::ErrorKind;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::state::AppState;

pub const STRIPE_SIGNATURE: &str = "stripe-signature";

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static(STRIPE_SIGNATURE),
        ]);

    Router::new()
        .route("/functions/v1/process-call", post(calls::process_call))
        .route("/functions/v1/encompass-push", post(applications::encompass_push))
        .route("/functions/v1/stripe-webhook", post(billing::stripe_webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    kind: Option<ErrorKind>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<ErrorKind>,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            kind: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: Option<ErrorKind>) -> Self {
        self.kind = kind;
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, kind = ?self.kind, "{}", self.message);
        }
        let body = ErrorBody {
            error: &self.message,
            error_kind: self.kind,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Parses a JSON request body, answering 400 when it is not valid.
pub fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
}

/// A required, non-blank string field.
pub fn required(value: Option<String>, message: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(message))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use loancall::ai::{MockExtractor, MockTranscriber};
    use loancall::billing::PlanTable;
    use loancall::los::SimulatedLos;
    use loancall::model::{CallAnalysis, LoanInfo};
    use loancall::{
        BillingWebhook, CallPipeline, Database, FileArtifactStore, LosPusher, PipelineConfig,
        SignatureVerifier,
    };
    use secrecy::SecretString;
    use serde_json::Value;
    use tempfile::TempDir;
    use tower::ServiceExt;

    use super::*;

    pub const WEBHOOK_SECRET: &str = "whsec_router_test";

    pub struct TestApp {
        pub _dir: TempDir,
        pub db: Database,
        pub artifacts: Arc<FileArtifactStore>,
        pub router: Router,
    }

    pub fn analysis() -> CallAnalysis {
        CallAnalysis {
            summary: Some("Wants a conventional loan".to_string()),
            key_points: Some(vec!["$450,000".to_string()]),
            action_items: Some(vec!["Send disclosures".to_string()]),
            loan_info: Some(LoanInfo {
                loan_type: Some("Conventional".to_string()),
                loan_amount: Some(450_000.0),
                property_type: Some("Single Family Home".to_string()),
                rate: None,
                term: Some(30),
            }),
        }
    }

    impl TestApp {
        pub fn new(transcriber: MockTranscriber, extractor: MockExtractor) -> Self {
            Self::build(transcriber, extractor, true)
        }

        pub fn without_webhook_secret() -> Self {
            Self::build(MockTranscriber::new(), MockExtractor::new(), false)
        }

        fn build(transcriber: MockTranscriber, extractor: MockExtractor, signed: bool) -> Self {
            let dir = TempDir::new().unwrap();
            let db = Database::open_in_memory().unwrap();
            let store = Arc::new(db.clone());
            let artifacts = Arc::new(FileArtifactStore::new(dir.path()));

            let pipeline = CallPipeline::new(
                Arc::new(PipelineConfig::default()),
                store.clone(),
                artifacts.clone(),
                Arc::new(transcriber),
                Arc::new(extractor),
            );
            let pusher = LosPusher::new(
                store.clone(),
                Arc::new(SimulatedLos::new()),
                Duration::from_secs(5),
            );
            let verifier = signed.then(|| {
                SignatureVerifier::new(
                    SecretString::from(WEBHOOK_SECRET),
                    Duration::from_secs(300),
                )
            });
            let billing = BillingWebhook::new(verifier, PlanTable::default(), store);

            let state = AppState {
                pipeline: Arc::new(pipeline),
                pusher: Arc::new(pusher),
                billing: Arc::new(billing),
            };
            Self {
                _dir: dir,
                db,
                artifacts,
                router: router(state),
            }
        }

        pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, json)
        }
    }

    pub fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }
}
