//! Shared handler state, wired from configuration.

use std::sync::Arc;
use std::time::Duration;

use loancall::ai::adapters_from_config;
use loancall::los::client_from_config;
use loancall::storage::store_from_config;
use loancall::{
    BillingWebhook, CallPipeline, Config, ConfigError, Database, LosPusher, PipelineConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<CallPipeline>,
    pub pusher: Arc<LosPusher>,
    pub billing: Arc<BillingWebhook>,
}

impl AppState {
    pub fn from_config(config: &Config, db: &Database) -> Result<Self, ConfigError> {
        let store = Arc::new(db.clone());
        let (transcriber, extractor) = adapters_from_config(&config.openai)?;

        let pipeline = CallPipeline::new(
            Arc::new(PipelineConfig::from_config(config)),
            store.clone(),
            store_from_config(&config.artifacts)?,
            transcriber,
            extractor,
        );
        let pusher = LosPusher::new(
            store.clone(),
            client_from_config(&config.los)?,
            Duration::from_secs(config.timeouts.los_push_secs),
        );
        let billing = BillingWebhook::from_config(&config.billing, store)?;

        Ok(Self {
            pipeline: Arc::new(pipeline),
            pusher: Arc::new(pusher),
            billing: Arc::new(billing),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_wires_offline_adapters() {
        let db = Database::open_in_memory().unwrap();
        let mut config = Config::default();
        config.openai.api_key_env = Some("LOANCALL_TEST_UNSET_OPENAI_KEY".to_string());
        config.billing.webhook_secret = Some("whsec_test".to_string());
        assert!(AppState::from_config(&config, &db).is_ok());
    }
}
