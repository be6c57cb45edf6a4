use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::model::Plan;

pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub los: LosConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            server: ServerConfig::default(),
            artifacts: ArtifactsConfig::default(),
            openai: OpenAiConfig::default(),
            los: LosConfig::default(),
            billing: BillingConfig::default(),
            timeouts: TimeoutsConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Defaults to `~/.loancall/data/loancall.db`.
    #[serde(default)]
    pub database_path: Option<String>,
}

impl ServerConfig {
    /// Configured database path with `~` expanded, else the default location.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        match self.database_path.as_deref().filter(|p| !p.is_empty()) {
            Some(path) => Some(PathBuf::from(crate::secrets::expand_home(path))),
            None => crate::db::default_database_path(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            database_path: None,
        }
    }
}

/// Where call audio lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArtifactsConfig {
    Filesystem {
        #[serde(default = "default_artifact_root")]
        root: String,
        /// Prefix for public URLs; `file://` URLs are returned when unset.
        #[serde(default)]
        public_base_url: Option<String>,
    },
    /// Object storage reached over HTTP (`PUT`/`GET {base_url}/{path}`).
    Http {
        base_url: String,
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        token_file: Option<String>,
        #[serde(default)]
        token_env: Option<String>,
    },
}

fn default_artifact_root() -> String {
    "~/.loancall/artifacts".to_string()
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        ArtifactsConfig::Filesystem {
            root: default_artifact_root(),
            public_base_url: None,
        }
    }
}

/// OpenAI-compatible transcription and chat endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,
    #[serde(default = "default_extraction_model")]
    pub extraction_model: String,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_openai_key_env() -> Option<String> {
    Some("OPENAI_API_KEY".to_string())
}

fn default_transcription_model() -> String {
    "whisper-1".to_string()
}

fn default_extraction_model() -> String {
    "gpt-4-turbo-preview".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            api_key: None,
            api_key_file: None,
            api_key_env: default_openai_key_env(),
            transcription_model: default_transcription_model(),
            extraction_model: default_extraction_model(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LosMode {
    /// Assigns `EN-<n>` IDs without any network call.
    #[default]
    Simulated,
    Encompass,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LosConfig {
    #[serde(default)]
    pub mode: LosMode,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_los_key_env")]
    pub api_key_env: Option<String>,
}

fn default_los_key_env() -> Option<String> {
    Some("ENCOMPASS_API_KEY".to_string())
}

impl Default for LosConfig {
    fn default() -> Self {
        Self {
            mode: LosMode::Simulated,
            base_url: None,
            api_key: None,
            api_key_file: None,
            api_key_env: default_los_key_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub webhook_secret_file: Option<String>,
    #[serde(default = "default_webhook_secret_env")]
    pub webhook_secret_env: Option<String>,
    /// Maximum age of a signed event, in seconds.
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: u64,
    /// Provider price ID to plan.
    #[serde(default = "default_price_plans")]
    pub price_plans: BTreeMap<String, Plan>,
}

fn default_webhook_secret_env() -> Option<String> {
    Some("STRIPE_WEBHOOK_SECRET".to_string())
}

fn default_tolerance_secs() -> u64 {
    300
}

pub fn default_price_plans() -> BTreeMap<String, Plan> {
    BTreeMap::from([
        ("price_starter".to_string(), Plan::Starter),
        ("price_professional".to_string(), Plan::Professional),
        ("price_enterprise".to_string(), Plan::Enterprise),
    ])
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            webhook_secret: None,
            webhook_secret_file: None,
            webhook_secret_env: default_webhook_secret_env(),
            tolerance_secs: default_tolerance_secs(),
            price_plans: default_price_plans(),
        }
    }
}

/// Per-call timeouts for external collaborators, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_artifact_fetch_secs")]
    pub artifact_fetch_secs: u64,
    #[serde(default = "default_transcription_secs")]
    pub transcription_secs: u64,
    #[serde(default = "default_extraction_secs")]
    pub extraction_secs: u64,
    #[serde(default = "default_los_push_secs")]
    pub los_push_secs: u64,
}

fn default_artifact_fetch_secs() -> u64 {
    60
}

fn default_transcription_secs() -> u64 {
    300
}

fn default_extraction_secs() -> u64 {
    120
}

fn default_los_push_secs() -> u64 {
    30
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            artifact_fetch_secs: default_artifact_fetch_secs(),
            transcription_secs: default_transcription_secs(),
            extraction_secs: default_extraction_secs(),
            los_push_secs: default_los_push_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// How long a claim protects a run before another invocation may take over.
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,
    #[serde(default = "default_true")]
    pub recover_on_startup: bool,
}

fn default_claim_lease_secs() -> u64 {
    900
}

fn default_true() -> bool {
    true
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            claim_lease_secs: default_claim_lease_secs(),
            recover_on_startup: true,
        }
    }
}
