use std::time::Duration;

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub artifact_fetch_timeout: Duration,
    pub transcription_timeout: Duration,
    pub extraction_timeout: Duration,
    /// A claim older than this no longer protects a run.
    pub claim_lease: Duration,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            artifact_fetch_timeout: Duration::from_secs(config.timeouts.artifact_fetch_secs),
            transcription_timeout: Duration::from_secs(config.timeouts.transcription_secs),
            extraction_timeout: Duration::from_secs(config.timeouts.extraction_secs),
            claim_lease: Duration::from_secs(config.processing.claim_lease_secs),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
