//! Application paths and persisted settings
//!
//! Config directory priority:
//! 1. `--config-dir` CLI argument
//! 2. `SIGNPLAY_CONFIG_DIR` environment variable
//! 3. Current folder IF it already holds `signplay.json` or `signplay.log`
//! 4. Platform config directory from dirs-next
//!    (Linux: ~/.config/signplay, macOS: ~/Library/Application Support/signplay,
//!    Windows: %APPDATA%\signplay)
//!
//! Settings live in `signplay.json`; a missing file means defaults. CLI flags
//! override whatever the file says (see `Settings::apply_args`).

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::Args;

/// Settings file name
pub const SETTINGS_FILE: &str = "signplay.json";

/// Default log file name (data dir)
pub const LOG_FILE: &str = "signplay.log";

const APP_DIR: &str = "signplay";

/// Overrides for the default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// CLI args first, then SIGNPLAY_CONFIG_DIR
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var("SIGNPLAY_CONFIG_DIR").ok().map(PathBuf::from));
        Self { config_dir }
    }
}

pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    get_config_dir(config).join(name)
}

pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    get_data_dir(config).join(name)
}

/// Create config and data directories if missing
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = get_config_dir(config);
    let data_dir = get_data_dir(config);

    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
    if data_dir != config_dir {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    }
    Ok(())
}

fn has_local_files(dir: &Path) -> bool {
    [SETTINGS_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

fn local_dir() -> Option<PathBuf> {
    std::env::current_dir().ok().filter(|dir| has_local_files(dir))
}

fn get_config_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    local_dir()
        .or_else(|| dirs_next::config_dir().map(|d| d.join(APP_DIR)))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn get_data_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    local_dir()
        .or_else(|| dirs_next::data_dir().map(|d| d.join(APP_DIR)))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Persisted settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding `<Name>.clip` files
    pub assets_dir: PathBuf,
    /// Initial speed multiplier
    pub speed: f32,
    /// Pause between words at 1x (ms)
    pub word_gap_ms: u64,
    /// Nominal clip length for the headless player (ms)
    pub clip_duration_ms: u64,
    /// Warm the letter/digit cache at startup
    pub preload_alphabet: bool,
    /// Fetch worker threads (None = half the cores)
    pub workers: Option<usize>,
    pub server_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("clips"),
            speed: 1.0,
            word_gap_ms: 300,
            clip_duration_ms: 1200,
            preload_alphabet: true,
            workers: None,
            server_port: 9310,
        }
    }
}

impl Settings {
    /// Load `signplay.json` from the config dir (defaults if absent)
    pub fn load(paths: &PathConfig) -> Result<Self> {
        let path = config_file(SETTINGS_FILE, paths);
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write settings: {}", path.display()))
    }

    /// CLI flags win over file values
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(dir) = &args.assets {
            self.assets_dir = dir.clone();
        }
        if let Some(speed) = args.speed {
            self.speed = speed;
        }
        if let Some(gap) = args.word_gap_ms {
            self.word_gap_ms = gap;
        }
        if let Some(clip) = args.clip_ms {
            self.clip_duration_ms = clip;
        }
        if let Some(port) = args.port {
            self.server_port = port;
        }
        if let Some(n) = args.workers {
            self.workers = Some(n);
        }
        if args.no_preload {
            self.preload_alphabet = false;
        }
    }

    pub fn word_gap(&self) -> Duration {
        Duration::from_millis(self.word_gap_ms)
    }

    pub fn clip_duration(&self) -> Duration {
        Duration::from_millis(self.clip_duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use uuid::Uuid;

    #[test]
    fn test_custom_dir() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };
        assert_eq!(config_file("a.json", &config), PathBuf::from("/custom/a.json"));
        assert_eq!(data_file("b.log", &config), PathBuf::from("/custom/b.log"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = std::env::temp_dir().join(format!("signplay-missing-{}.json", Uuid::new_v4()));
        assert_eq!(Settings::load_from(&path).unwrap(), Settings::default());
    }

    #[test]
    fn test_save_and_load_partial() {
        let dir = std::env::temp_dir().join(format!("signplay-cfg-{}", Uuid::new_v4()));
        let config = PathConfig { config_dir: Some(dir.clone()) };
        ensure_dirs(&config).unwrap();

        let path = config_file(SETTINGS_FILE, &config);
        std::fs::write(&path, r#"{ "speed": 1.5, "assets_dir": "/srv/clips" }"#).unwrap();
        let loaded = Settings::load(&config).unwrap();
        assert_eq!(loaded.speed, 1.5);
        assert_eq!(loaded.assets_dir, PathBuf::from("/srv/clips"));
        assert_eq!(loaded.word_gap_ms, 300);

        loaded.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path).unwrap(), loaded);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_bad_json_is_error() {
        let dir = std::env::temp_dir().join(format!("signplay-bad-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(SETTINGS_FILE);
        std::fs::write(&path, "{ nope").unwrap();
        assert!(Settings::load_from(&path).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_args_override() {
        let args = Args::parse_from(["signplay", "hi", "--speed", "2", "--assets", "/x", "--no-preload"]);
        let mut settings = Settings::default();
        settings.apply_args(&args);
        assert_eq!(settings.speed, 2.0);
        assert_eq!(settings.assets_dir, PathBuf::from("/x"));
        assert!(!settings.preload_alphabet);
        assert_eq!(settings.server_port, 9310);
    }
}
