//! # Configuration Management Module
//!
//! TOML-backed configuration for the appliance. Sections:
//!
//! - [`BotConfig`] - chat-bot identity and long-poll cadence
//! - [`NetworkConfig`] - association attempt budget and reconnect policy
//! - [`StorageConfig`] - data directory and store file names
//! - [`DisplayConfig`] - panel backend and backlight timeout
//! - [`LoggingConfig`] - level and optional log file
//!
//! ```toml
//! [bot]
//! token = "123456:ABC..."
//! chat_id = "987654321"
//!
//! [display]
//! backend = "lcd"
//! backlight_timeout_secs = 8
//! ```
//!
//! Credentials and pin-level wiring are deployment configuration; nothing
//! here is reconfigurable at runtime.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bot: BotConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Bot API token.
    pub token: String,
    /// The single authorized chat peer. Messages from any other chat are
    /// dropped by the transport.
    pub chat_id: String,
    /// Gate between long-poll cycles (ms).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Association attempts before the fail-fast restart.
    pub max_attempts: u32,
    /// How long each attempt polls for link-up (seconds).
    pub attempt_timeout_secs: u64,
    /// Backoff between attempts (seconds).
    pub retry_delay_secs: u64,
    /// Steady-state link re-check interval (seconds).
    pub check_interval_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            max_attempts: 5,
            attempt_timeout_secs: 20,
            retry_delay_secs: 5,
            check_interval_secs: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    pub codes_file: String,
    pub last_update_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_dir: "./data".to_string(),
            codes_file: "dataCodes.txt".to_string(),
            last_update_file: "last_msg_id.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Panel backend: "lcd" (20x4 character LCD) or "oled" (128x64).
    pub backend: String,
    /// Idle seconds before the backlight turns off; 0 disables the timeout.
    pub backlight_timeout_secs: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        DisplayConfig {
            backend: "lcd".to_string(),
            backlight_timeout_secs: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Create a default configuration file.
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bot: BotConfig {
                token: String::new(),
                chat_id: String::new(),
                poll_interval_ms: default_poll_interval_ms(),
            },
            network: NetworkConfig::default(),
            storage: StorageConfig::default(),
            display: DisplayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_appliance_policy() {
        let config = Config::default();
        assert_eq!(config.network.max_attempts, 5);
        assert_eq!(config.network.attempt_timeout_secs, 20);
        assert_eq!(config.network.retry_delay_secs, 5);
        assert_eq!(config.bot.poll_interval_ms, 200);
        assert_eq!(config.display.backend, "lcd");
        assert_eq!(config.display.backlight_timeout_secs, 8);
        assert_eq!(config.storage.codes_file, "dataCodes.txt");
    }

    #[test]
    fn toml_round_trip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.storage.data_dir, config.storage.data_dir);
        assert_eq!(parsed.network.max_attempts, config.network.max_attempts);
        assert_eq!(parsed.display.backend, config.display.backend);
    }

    #[test]
    fn minimal_config_gets_section_defaults() {
        let parsed: Config = toml::from_str(
            "[bot]\ntoken = \"t\"\nchat_id = \"c\"\n",
        )
        .unwrap();
        assert_eq!(parsed.bot.token, "t");
        assert_eq!(parsed.bot.poll_interval_ms, 200);
        assert_eq!(parsed.network.max_attempts, 5);
        assert_eq!(parsed.display.backlight_timeout_secs, 8);
    }
}
