use anyhow::{anyhow, Result};
use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

use crate::history::DEFAULT_HISTORY_CAP;

/// The structure of our configuration file (config.toml)
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub console: ConsoleConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// Listen address. `HOST` and `PORT` from the environment win over the file.
    pub fn listen_addr(&self) -> String {
        let host = std::env::var("HOST").unwrap_or_else(|_| self.host.clone());
        let port = std::env::var("PORT").unwrap_or_else(|_| self.port.to_string());
        format!("{}:{}", host, port)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub format: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            base_url: "https://api.nekolabs.web.id/downloader/youtube/v1".to_string(),
            format: "mp3".to_string(),
            timeout_secs: 20,
            user_agent: "Mozilla/5.0 (compatible; ada-api-proxy)".to_string(),
        }
    }
}

impl UpstreamConfig {
    /// Upstream timeout, kept within 15..=20 seconds.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.clamp(15, 20)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ConsoleConfig {
    pub origin: String,
    pub catalog: String,
    pub history_cap: usize,
    pub request_timeout_secs: u64,
    pub max_blob_bytes: usize,
    pub download_directory: String,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        // Use the 'directories' crate to find the user's download directory.
        let download_directory = UserDirs::new()
            .and_then(|dirs| dirs.download_dir().map(|p| p.to_string_lossy().to_string()))
            .unwrap_or_else(|| "downloads".to_string()); // Fallback

        ConsoleConfig {
            origin: "http://127.0.0.1:8080".to_string(),
            catalog: "settings.json".to_string(),
            history_cap: DEFAULT_HISTORY_CAP,
            request_timeout_secs: 30,
            max_blob_bytes: 64 * 1024 * 1024,
            download_directory,
        }
    }
}

impl ConsoleConfig {
    /// History length, kept within 10..=20 entries.
    pub fn history_cap(&self) -> usize {
        self.history_cap.clamp(10, 20)
    }
}

/// Returns the cross-platform path to the configuration file, creating the directory if needed.
async fn get_config_path() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("id", "AdaAPI", "ada-api")
        .ok_or_else(|| anyhow!("Could not find a valid home directory to store config"))?;

    let config_dir = project_dirs.config_dir();
    fs::create_dir_all(config_dir).await?;

    Ok(config_dir.join("config.toml"))
}

/// Loads the configuration from the file, or creates a default one if it doesn't exist.
pub async fn load_config() -> Result<Config> {
    let config_path = get_config_path().await?;

    if !config_path.exists() {
        tracing::info!(
            "No config file found. Creating a default one at: {}",
            config_path.display()
        );
        let default_config = Config::default();
        save_config(&default_config).await?;
        return Ok(default_config);
    }

    let config_content = fs::read_to_string(&config_path).await?;
    parse_config(&config_content)
        .map_err(|e| anyhow!("Failed to parse config file at {}: {}", config_path.display(), e))
}

/// Parses a TOML document; missing sections and keys take their defaults.
pub fn parse_config(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

/// Saves the provided configuration object to the file.
pub async fn save_config(config: &Config) -> Result<()> {
    let config_path = get_config_path().await?;
    let toml_string = toml::to_string_pretty(config)?;
    fs::write(config_path, toml_string).await?;
    Ok(())
}
