pub mod settings;

pub use settings::ClientConfig;

use crate::error::{InfinityError, Result};

/// Loads the client configuration from the process environment.
///
/// A `.env` file in the working directory is honoured when present. The
/// token and bot id are required; everything else falls back to defaults.
pub fn load_config() -> Result<ClientConfig> {
    dotenv::dotenv().ok(); // Load .env file if present, ignore errors

    let config = ClientConfig::from_env()?;

    if config.token.trim().is_empty() {
        return Err(InfinityError::ConfigError(
            "INFINITY_BOT_TOKEN cannot be empty".to_string(),
        ));
    }
    if config.bot_id.trim().is_empty() {
        return Err(InfinityError::ConfigError(
            "INFINITY_BOT_ID cannot be empty".to_string(),
        ));
    }

    config.validate_and_log();

    Ok(config)
}
