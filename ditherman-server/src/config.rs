use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use tokio::fs;
use toml_edit::DocumentMut;

#[cfg(feature = "embed_ui")]
use rust_embed::RustEmbed;

#[cfg(feature = "embed_ui")]
#[derive(RustEmbed)]
#[folder = "../"]
#[include = "ditherman.example.toml"]
struct ConfigAssets;

/// Default on-disk config filename
pub const DEFAULT_CONFIG_PATH: &str = "ditherman.toml";
/// Environment variable overriding the config path.
pub const CONFIG_PATH_ENV: &str = "DITHERMAN_CONFIG";

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_STATIC_DIR: &str = "static";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

/// Strongly typed representation of the configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    pub server: Option<Server>,
    pub logging: Option<Logging>,
    pub limits: Option<Limits>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Server {
    pub bind_address: Option<String>,
    /// Directory served at `/` when the UI is not embedded.
    pub static_dir: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Logging {
    pub filter: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Limits {
    /// Largest accepted request body.
    pub max_upload_bytes: Option<usize>,
}

impl Config {
    pub fn bind_address(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind_address.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string())
    }

    #[cfg_attr(feature = "embed_ui", allow(dead_code))]
    pub fn static_dir(&self) -> PathBuf {
        self.server
            .as_ref()
            .and_then(|s| s.static_dir.clone())
            .unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string())
            .into()
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.limits
            .as_ref()
            .and_then(|l| l.max_upload_bytes)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES)
    }

    pub fn log_filter(&self) -> Option<String> {
        self.logging.as_ref().and_then(|l| l.filter.clone())
    }
}

pub struct ConfigManager;

impl ConfigManager {
    /// Config path from `DITHERMAN_CONFIG`, falling back to the default name.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load the config file. If it does not exist it is created from the
    /// embedded example; without the embedded example, defaults are used.
    pub async fn load(path: Option<PathBuf>) -> Result<Config> {
        let path = path.unwrap_or_else(Self::default_path);

        if !path.exists() {
            #[cfg(feature = "embed_ui")]
            {
                if let Some(example_file) = ConfigAssets::get("ditherman.example.toml") {
                    let example_content = std::str::from_utf8(&example_file.data)
                        .with_context(|| "embedded example config is not valid UTF-8")?;
                    fs::write(&path, example_content)
                        .await
                        .with_context(|| format!("writing example config to {}", path.display()))?;
                    // Logging is not set up yet at this point.
                    println!("Created default config file: {}", path.display());
                } else {
                    return Ok(Config::default());
                }
            }
            #[cfg(not(feature = "embed_ui"))]
            {
                println!("Config file {} not found, using defaults", path.display());
                return Ok(Config::default());
            }
        }

        let text = fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Config> {
        let doc = text.parse::<DocumentMut>()?;
        let typed: Config = toml_edit::de::from_document(doc)?;
        Ok(typed)
    }
}
