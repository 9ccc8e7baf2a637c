use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const API_URL_ENV: &str = "BIBLE_STUDY_API_URL";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub default_book: String,
    pub default_chapter: u32,
    pub notes_limit: u32,
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            default_book: "John".to_string(),
            default_chapter: 3,
            notes_limit: 200,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the user config dir, then apply the environment override.
    ///
    /// An unreadable file falls back to defaults; the error is handed back so
    /// the caller can report it once logging is up.
    pub fn load() -> (Self, Option<anyhow::Error>) {
        let loaded = Self::get_config_path().and_then(|path| Self::load_from(&path));
        Self::with_env_override(loaded, std::env::var(API_URL_ENV).ok())
    }

    fn with_env_override(loaded: Result<Self>, env_url: Option<String>) -> (Self, Option<anyhow::Error>) {
        let (mut config, error) = match loaded {
            Ok(config) => (config, None),
            Err(e) => (Self::new(), Some(e)),
        };
        if let Some(url) = env_url {
            config.set_api_base_url(&url);
        }
        (config, error)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn set_api_base_url(&mut self, url: &str) {
        let trimmed = url.trim().trim_end_matches('/');
        if !trimmed.is_empty() {
            self.api_base_url = trimmed.to_string();
        }
    }

    /// Directory for the log file. Falls back to the platform cache dir, then /tmp.
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|p| p.join("bible-study")))
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("bible-study").join("config.json"))
    }
}
