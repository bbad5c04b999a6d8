//! Configuration management for MidiCue GW
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.
//! Every section has defaults, so an empty file is a valid configuration.

pub mod watcher;

use crate::protocol::{MAX_BPM, MIN_BPM};
use crate::resolver::ResolverConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub resolver: ResolverSettings,
    #[serde(default)]
    pub export: ExportSettings,
    #[serde(default)]
    pub library: LibraryConfig,
    #[serde(default)]
    pub state: StateConfig,
}

/// Resolver timings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ResolverSettings {
    /// Identify events this soon after a blank/stop skip external lookups
    #[serde(default = "default_clear_cooldown_ms")]
    pub clear_cooldown_ms: u64,
    /// Minimum spacing of "unresolved identity" warnings
    #[serde(default = "default_warning_interval_ms")]
    pub warning_interval_ms: u64,
    /// Timeout for each library lookup and selection load
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            clear_cooldown_ms: default_clear_cooldown_ms(),
            warning_interval_ms: default_warning_interval_ms(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
        }
    }
}

impl From<&ResolverSettings> for ResolverConfig {
    fn from(settings: &ResolverSettings) -> Self {
        ResolverConfig {
            clear_cooldown: Duration::from_millis(settings.clear_cooldown_ms),
            warning_interval: Duration::from_millis(settings.warning_interval_ms),
            lookup_timeout: Duration::from_millis(settings.lookup_timeout_ms),
        }
    }
}

/// Cue file export defaults
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExportSettings {
    /// Tempo used when a recording carries none
    #[serde(default = "default_bpm")]
    pub default_bpm: f64,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            default_bpm: default_bpm(),
        }
    }
}

/// Item sources searched by the resolver; unset sources are skipped
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LibraryConfig {
    /// YAML/JSON list of song and bible items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub songs_file: Option<PathBuf>,
    /// Directory scanned for video, image and audio files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_dir: Option<PathBuf>,
    /// Directory of presentation JSON files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentations_dir: Option<PathBuf>,
}

/// Setlist persistence
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StateConfig {
    /// sled database path; defaults to the platform data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::parse(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn parse(contents: &str) -> Result<Self> {
        // An empty document deserializes as null
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.resolver.lookup_timeout_ms == 0 {
            anyhow::bail!("resolver.lookup_timeout_ms must be greater than 0");
        }
        if self.resolver.warning_interval_ms == 0 {
            anyhow::bail!("resolver.warning_interval_ms must be greater than 0");
        }

        let bpm = self.export.default_bpm;
        if !bpm.is_finite() || !(MIN_BPM..=MAX_BPM).contains(&bpm) {
            anyhow::bail!(
                "export.default_bpm {} is outside {}..={}",
                bpm,
                MIN_BPM,
                MAX_BPM
            );
        }

        let paths = [
            ("library.songs_file", &self.library.songs_file),
            ("library.media_dir", &self.library.media_dir),
            ("library.presentations_dir", &self.library.presentations_dir),
            ("state.db_path", &self.state.db_path),
        ];
        for (name, path) in paths {
            if path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                anyhow::bail!("{} cannot be empty", name);
            }
        }

        Ok(())
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig::from(&self.resolver)
    }
}

fn default_clear_cooldown_ms() -> u64 { 3000 }
fn default_warning_interval_ms() -> u64 { 10_000 }
fn default_lookup_timeout_ms() -> u64 { 5000 }
fn default_bpm() -> f64 { 120.0 }
