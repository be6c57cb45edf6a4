pub mod ai;
pub mod billing;
pub mod config;
pub mod db;
pub mod error;
mod http;
pub mod intake;
pub mod los;
pub mod model;
pub mod pipeline;
pub mod sanitize;
pub mod secrets;
pub mod storage;

pub use ai::{AdapterError, ChatExtractor, Extractor, KeywordExtractor, Transcriber, WhisperTranscriber};
pub use billing::{BillingWebhook, PlanTable, SignatureVerifier, WebhookError, WebhookOutcome};
pub use config::{load_config, Config};
pub use db::{ApplicationStore, CallStore, Database, DatabaseError, SubscriptionStore};
pub use error::{ConfigError, ErrorKind, LoanCallError, Result, StorageError};
pub use intake::{CallIntake, CallUpload};
pub use los::{LosClient, LosPusher, PushError, PushOutcome};
pub use model::{
    ApplicationStatus, CallAnalysis, CallJob, CallStatus, LoanApplication, LoanInfo, Plan,
    Subscription, SubscriptionStatus,
};
pub use pipeline::{CallPipeline, PipelineConfig, PipelineError, ProcessOutcome};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use storage::{ArtifactStore, AudioClip, FileArtifactStore, HttpArtifactStore};
