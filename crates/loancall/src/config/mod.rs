use std::path::PathBuf;

pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, load_config_or_default};
pub use schema::{
    ArtifactsConfig, BillingConfig, Config, LosConfig, LosMode, OpenAiConfig, ProcessingConfig,
    ServerConfig, TimeoutsConfig,
};

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "LOANCALL_CONFIG";

/// Config path from `LOANCALL_CONFIG`, else `~/.loancall/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|h| h.join(".loancall").join("config.json"))
}
