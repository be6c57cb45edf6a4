//! Tracing setup for the server binary.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log filter, e.g. `LOANCALL_LOG=loancall=debug,tower_http=info`.
pub const LOG_ENV_VAR: &str = "LOANCALL_LOG";
/// `json` switches to one JSON object per line.
pub const LOG_FORMAT_ENV_VAR: &str = "LOANCALL_LOG_FORMAT";

/// Installs the global subscriber and routes `log` records from the
/// database layer into it.
pub fn init_tracing() {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("Failed to bridge log records into tracing: {}", e);
    }

    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV_VAR)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer));

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install tracing subscriber: {}", e);
    }
}
