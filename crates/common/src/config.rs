//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default export settings.
    pub export: ExportDefaults,

    /// Font files available to the caption renderer.
    #[serde(default)]
    pub fonts: FontConfig,

    /// Optional JSON file with user caption templates.
    #[serde(default)]
    pub templates_file: Option<PathBuf>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default export parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// Output frame rate.
    pub fps: u32,

    /// Output video codec passed to the encoder.
    pub video_codec: String,

    /// Video bitrate in kbps.
    pub video_bitrate_kbps: u32,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// Aspect preset name (`portrait` or `landscape`).
    pub aspect: String,

    /// Upper bound for a single source seek, in milliseconds.
    pub seek_timeout_ms: u64,

    /// Root directory for per-export staging folders.
    pub staging_dir: PathBuf,

    /// Directory receiving finished exports.
    pub output_dir: PathBuf,
}

/// Font configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    /// TrueType/OpenType files to load.
    pub files: Vec<PathBuf>,

    /// Family used when a caption names a family that is not loaded.
    pub default_family: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "captionkit=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            export: ExportDefaults::default(),
            fonts: FontConfig::default(),
            templates_file: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            fps: 30,
            video_codec: "h264".to_string(),
            video_bitrate_kbps: 8000,
            audio_bitrate_kbps: 192,
            aspect: "portrait".to_string(),
            seek_timeout_ms: 5000,
            staging_dir: std::env::temp_dir().join("captionkit"),
            output_dir: default_data_dir().join("exports"),
        }
    }
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            files: vec![],
            default_family: "Inter".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("captionkit").join("config.json")
}

/// Default data directory.
fn default_data_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("captionkit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("captionkit_missing_config.json");
        let _ = std::fs::remove_file(&path);
        let config = AppConfig::load_from(&path);
        assert_eq!(config.export.fps, 30);
        assert_eq!(config.export.seek_timeout_ms, 5000);
    }

    #[test]
    fn test_partial_export_section_uses_defaults() {
        let json = r#"{
            "export": { "fps": 24 },
            "logging": { "level": "debug", "json": false, "file": null }
        }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.export.fps, 24);
        assert_eq!(config.export.video_codec, "h264");
        assert_eq!(config.fonts.default_family, "Inter");
        assert!(config.templates_file.is_none());
    }

    #[test]
    fn test_invalid_config_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("captionkit_invalid_config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = AppConfig::load_from(&path);
        assert_eq!(config.export.aspect, "portrait");
        std::fs::remove_file(&path).ok();
    }
}
