// Configuration for the preview player
// Loads settings from TOML, writing sensible defaults the first time round

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub player: PlayerConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub default_volume: f32,
    pub seek_fallback_ms: u64,
    pub skip_step_seconds: f64,
    pub progress_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Demo paths from the storefront API are resolved against this
    pub api_base_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            player: PlayerConfig::default(),
            catalog: CatalogConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: 1.0,
            seek_fallback_ms: 1000,
            skip_step_seconds: 10.0,
            progress_interval_ms: 250,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            filter: "info,beatplayer=debug".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Missing file means first run - write the defaults out and use them
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("parsing config {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("beatplayer");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::PlayerSettings;
    use std::time::Duration;

    #[test]
    fn test_missing_config_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_config_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[player]\ndefault_volume = 0.5\n\n[catalog]\napi_base_url = \"https://beats.example.com\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.player.default_volume, 0.5);
        assert_eq!(config.player.seek_fallback_ms, 1000);
        assert_eq!(config.catalog.api_base_url, "https://beats.example.com");
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_broken_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[player\nnope").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_player_settings_from_config() {
        let mut config = Config::default();
        config.player.default_volume = 1.7;
        config.player.seek_fallback_ms = 1500;
        config.player.progress_interval_ms = 0;

        let settings = PlayerSettings::from(&config);
        assert_eq!(settings.volume, 1.0);
        assert_eq!(settings.seek_fallback, Duration::from_millis(1500));
        assert_eq!(settings.progress_interval, Duration::from_millis(10));
        assert_eq!(settings.skip_step, 10.0);
    }
}
