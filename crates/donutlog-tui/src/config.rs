//! Configuration file handling.
//!
//! Reads from `~/.config/donutlog/donutlog.toml`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Color theme for the terminal UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Hanukkah,
}

impl Theme {
    /// The theme after this one when cycling with Ctrl+T.
    pub fn next(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Hanukkah,
            Self::Hanukkah => Self::Light,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Light => "☀️ בהיר",
            Self::Dark => "🌙 כהה",
            Self::Hanukkah => "🕎 חנוכה",
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project URL, e.g. `https://abc.supabase.co`.
    #[serde(default)]
    pub supabase_url: String,
    /// Public anon key of the project.
    #[serde(default)]
    pub supabase_anon_key: String,
    #[serde(default)]
    pub theme: Theme,
    /// Maximum entries fetched per feed.
    #[serde(default = "default_feed_limit")]
    pub feed_limit: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Where this config was loaded from; saves go back there.
    #[serde(skip)]
    path: Option<PathBuf>,
}

fn default_feed_limit() -> usize {
    200
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for Config {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            theme: Theme::default(),
            feed_limit: default_feed_limit(),
            request_timeout_secs: default_request_timeout_secs(),
            path: None,
        }
    }
}

impl Config {
    /// Load configuration from the config file.
    ///
    /// If `custom_path` is provided, load from that path.
    /// Otherwise, load from the default XDG config location.
    /// Creates a default config file if it doesn't exist (only for default path).
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self> {
        match custom_path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Self::load_from(&path)
            }
            None => {
                let path = Self::config_path()?;
                if path.exists() {
                    return Self::load_from(&path);
                }
                let config = Config {
                    path: Some(path),
                    ..Config::default()
                };
                config.save()?;
                tracing::info!("Created default config: {:?}", config);
                Ok(config)
            }
        }
    }

    fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.path = Some(path.to_path_buf());

        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save configuration to the file it was loaded from.
    pub fn save(&self) -> Result<()> {
        let config_path = match &self.path {
            Some(path) => path.clone(),
            None => Self::config_path()?,
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))
    }

    /// Project URL; `SUPABASE_URL` wins over the file.
    pub fn supabase_url(&self) -> Option<String> {
        resolve(std::env::var("SUPABASE_URL").ok(), &self.supabase_url)
    }

    /// Anon key; `SUPABASE_ANON_KEY` wins over the file.
    pub fn supabase_anon_key(&self) -> Option<String> {
        resolve(std::env::var("SUPABASE_ANON_KEY").ok(), &self.supabase_anon_key)
    }

    /// Get the path to the config file.
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("donutlog").join("donutlog.toml"))
    }
}

fn resolve(env: Option<String>, file: &str) -> Option<String> {
    env.filter(|v| !v.trim().is_empty())
        .or_else(|| Some(file.trim().to_string()).filter(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("donutlog.toml");
        std::fs::write(&path, "theme = \"hanukkah\"\n").unwrap();

        let config = Config::load(Some(path)).unwrap();
        assert_eq!(config.theme, Theme::Hanukkah);
        assert_eq!(config.feed_limit, 200);
        assert_eq!(config.request_timeout_secs, 15);
        assert!(config.supabase_url.is_empty());
    }

    #[test]
    fn save_writes_back_to_loaded_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("donutlog.toml");
        std::fs::write(&path, "supabase_url = \"https://abc.supabase.co\"\n").unwrap();

        let mut config = Config::load(Some(path.clone())).unwrap();
        config.theme = config.theme.next();
        config.save().unwrap();

        let reloaded = Config::load(Some(path)).unwrap();
        assert_eq!(reloaded.theme, Theme::Dark);
        assert_eq!(reloaded.supabase_url, "https://abc.supabase.co");
    }

    #[test]
    fn missing_custom_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn environment_overrides_file_values() {
        assert_eq!(
            resolve(Some("https://env".into()), "https://file"),
            Some("https://env".to_string())
        );
        assert_eq!(resolve(Some(" ".into()), "https://file"), Some("https://file".to_string()));
        assert_eq!(resolve(None, ""), None);
    }

    #[test]
    fn themes_cycle() {
        assert_eq!(Theme::Light.next().next().next(), Theme::Light);
    }
}
