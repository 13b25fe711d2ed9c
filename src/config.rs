//! Application paths and booth settings.
//!
//! Directory priority:
//! 1. CLI `--config-dir` argument
//! 2. `STARBOOTH_CONFIG_DIR` environment variable
//! 3. Local folder IF any starbooth files exist there
//! 4. Platform-specific directory from dirs-next (default)
//!
//! Platform paths:
//! - Linux: ~/.config/starbooth/{name}, ~/.local/share/starbooth/{name}
//! - macOS: ~/Library/Application Support/starbooth/{name}
//! - Windows: %APPDATA%\starbooth\{name}
//!
//! Settings are read once at startup; the booth never writes them back.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::compositor::DEFAULT_WATERMARK;
use crate::core::debounced_render::DEFAULT_DELAY_MS;
use crate::core::sequencer::DEFAULT_FLASH;
use crate::entities::TimerDuration;

pub const APP_NAME: &str = "starbooth";
pub const SETTINGS_FILE: &str = "starbooth.json";
pub const LOG_FILE: &str = "starbooth.log";
pub const ENV_CONFIG_DIR: &str = "STARBOOTH_CONFIG_DIR";

/// Configuration for overriding default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var (STARBOOTH_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var(ENV_CONFIG_DIR).ok().map(PathBuf::from));
        Self { config_dir }
    }
}

/// Path to a configuration file.
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    config_dir(config).join(name)
}

/// Path to a data file (logs, default output folder).
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    data_dir(config).join(name)
}

/// Create config and data directories if missing.
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let cfg = config_dir(config);
    let data = data_dir(config);

    if !cfg.exists() {
        std::fs::create_dir_all(&cfg)
            .with_context(|| format!("Failed to create config directory: {}", cfg.display()))?;
    }
    if data != cfg && !data.exists() {
        std::fs::create_dir_all(&data)
            .with_context(|| format!("Failed to create data directory: {}", data.display()))?;
    }
    Ok(())
}

fn has_local_files(dir: &Path) -> bool {
    [SETTINGS_FILE, LOG_FILE].iter().any(|f| dir.join(f).exists())
}

fn resolve_dir(config: &PathConfig, platform: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    if let Ok(cwd) = std::env::current_dir() {
        if has_local_files(&cwd) {
            return cwd;
        }
    }
    match platform {
        Some(dir) => dir.join(APP_NAME),
        None => PathBuf::from("."),
    }
}

fn config_dir(config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::config_dir())
}

fn data_dir(config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::data_dir())
}

/// Operator settings for a booth session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoothSettings {
    /// Footer watermark on every collage.
    pub event_title: String,
    /// Countdown seconds per shot: 3, 5 or 10.
    pub timer: TimerDuration,
    pub sound: bool,
    pub flash_ms: u64,
    /// Quiet period before recomposing after an edit.
    pub debounce_ms: u64,
    /// Where downloads land. Defaults to the data dir.
    pub output_dir: Option<PathBuf>,
    /// Run face detection during preview.
    pub detection: bool,
}

impl Default for BoothSettings {
    fn default() -> Self {
        Self {
            event_title: DEFAULT_WATERMARK.to_string(),
            timer: TimerDuration::default(),
            sound: true,
            flash_ms: DEFAULT_FLASH.as_millis() as u64,
            debounce_ms: DEFAULT_DELAY_MS,
            output_dir: None,
            detection: true,
        }
    }
}

impl BoothSettings {
    /// Load from `path`, falling back to defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        let settings: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load `starbooth.json` from the resolved config dir.
    pub fn load_default(config: &PathConfig) -> Result<Self> {
        Self::load(&config_file(SETTINGS_FILE, config))
    }

    pub fn flash(&self) -> Duration {
        Duration::from_millis(self.flash_ms)
    }

    /// Output folder: explicit setting, else `<data dir>/collages`.
    pub fn output_dir(&self, config: &PathConfig) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| data_file("collages", config))
    }
}
