use std::fs;
use std::path::{Path, PathBuf};

use frame_archive_core::shared::constants::RAW_FORMAT_TAG;
use frame_archive_core::BufferConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Padding applied when a command does not pass `--padding`.
    pub padding: f64,
    /// Sources loaded when a command names none.
    pub sources: Vec<String>,
    /// Codec tag used by `pack` when `--codec` is not given.
    pub codec: String,
    /// Staging buffer used by `pack`.
    pub buffer: BufferConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            padding: 0.0,
            sources: Vec::new(),
            codec: RAW_FORMAT_TAG.to_string(),
            buffer: BufferConfig::default(),
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("frame-archive").join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Settings stored at `path`; defaults when missing or unreadable.
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            self.save_to(&path);
        }
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(json) = serde_json::to_string_pretty(self) {
            if let Err(e) = fs::write(path, json) {
                log::warn!("Could not save settings to {}: {e}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_archive_core::video::infrastructure::video_buffer::BufferStorage;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Settings::load_from(&dir.path().join("none.json")), Settings::default());
    }

    #[test]
    fn test_corrupt_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&path), Settings::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            padding: 2.5,
            sources: vec!["/archive/all.manifest".to_string()],
            codec: "png".to_string(),
            buffer: BufferConfig {
                storage: BufferStorage::Memory,
                compression: Some("png".to_string()),
            },
        };
        settings.save_to(&path);
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "padding": 4.0 }"#).unwrap();
        let settings = Settings::load_from(&path);
        assert_eq!(settings.padding, 4.0);
        assert_eq!(settings.codec, "raw");
        assert!(settings.sources.is_empty());
    }
}
