use std::path::Path;

use crate::config::schema::{ArtifactsConfig, Config, LosMode, CONFIG_VERSION};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

/// Loads the file when it exists, otherwise returns the built-in defaults
/// (filesystem artifacts, simulated LOS, keys from the environment).
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        log::info!(
            "No config file at {}, using built-in defaults",
            path.display()
        );
        return Ok(Config::default());
    }
    load_config(path)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    let timeouts = &config.timeouts;
    for (name, secs) in [
        ("artifact_fetch_secs", timeouts.artifact_fetch_secs),
        ("transcription_secs", timeouts.transcription_secs),
        ("extraction_secs", timeouts.extraction_secs),
        ("los_push_secs", timeouts.los_push_secs),
        ("claim_lease_secs", config.processing.claim_lease_secs),
    ] {
        if secs == 0 {
            return Err(ConfigError::Validation {
                message: format!("{} must be positive", name),
            });
        }
    }

    // The lease must outlive one full run.
    let longest_run =
        timeouts.artifact_fetch_secs + timeouts.transcription_secs + timeouts.extraction_secs;
    if config.processing.claim_lease_secs < longest_run {
        return Err(ConfigError::Validation {
            message: format!(
                "claim_lease_secs ({}) must cover the sum of the processing timeouts ({})",
                config.processing.claim_lease_secs, longest_run
            ),
        });
    }

    if config.los.mode == LosMode::Encompass
        && config.los.base_url.as_deref().map_or(true, |u| u.trim().is_empty())
    {
        return Err(ConfigError::Validation {
            message: "los.base_url is required when los.mode is 'encompass'".to_string(),
        });
    }

    if let ArtifactsConfig::Http { base_url, .. } = &config.artifacts {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::Validation {
                message: format!("artifacts.base_url must be an http(s) URL: {}", base_url),
            });
        }
    }

    if config.billing.price_plans.keys().any(|k| k.trim().is_empty()) {
        return Err(ConfigError::Validation {
            message: "billing.price_plans contains an empty price ID".to_string(),
        });
    }

    Ok(())
}
