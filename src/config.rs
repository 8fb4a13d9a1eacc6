// Persisted settings: last-used choices and user presets

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::engine::core::{
    CustomPreset, DEFAULT_WATERMARK_SIZE, PresetCatalog, Watermark, WatermarkPosition,
};

const APP_DIR: &str = "hardsub";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub last_video_dir: Option<PathBuf>,

    #[serde(default)]
    pub last_output_dir: Option<PathBuf>,

    /// Preset selected last time (built-in or custom name)
    #[serde(default = "default_preset")]
    pub last_preset: String,

    /// Empty means no watermark
    #[serde(default)]
    pub watermark_text: String,

    #[serde(default)]
    pub watermark_position: WatermarkPosition,

    #[serde(default = "default_watermark_size")]
    pub watermark_size: u32,

    /// Manual ffmpeg location; unset means auto-detect
    #[serde(default)]
    pub encoder_path: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub use_hardware_accel: bool,

    #[serde(default)]
    pub copy_audio: bool,

    #[serde(default = "default_true")]
    pub preserve_metadata: bool,

    /// Pick up `movie.srt` / `.ass` / `.ssa` next to the input
    #[serde(default = "default_true")]
    pub auto_detect_subtitle: bool,

    /// Audio stream index to map; unset maps every audio stream
    #[serde(default)]
    pub audio_track: Option<u32>,

    #[serde(default)]
    pub custom_presets: Vec<CustomPreset>,
}

fn default_preset() -> String {
    "Max Quality".to_string()
}

fn default_watermark_size() -> u32 {
    DEFAULT_WATERMARK_SIZE
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            last_video_dir: None,
            last_output_dir: None,
            last_preset: default_preset(),
            watermark_text: String::new(),
            watermark_position: WatermarkPosition::default(),
            watermark_size: default_watermark_size(),
            encoder_path: None,
            use_hardware_accel: true,
            copy_audio: false,
            preserve_metadata: true,
            auto_detect_subtitle: true,
            audio_track: None,
            custom_presets: Vec::new(),
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "macos") {
            dirs::home_dir()
                .context("Could not determine home directory")?
                .join(".config")
                .join(APP_DIR)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join(APP_DIR)
        };

        Ok(config_dir.join(CONFIG_FILE))
    }

    /// Strict load: a missing or malformed file is an error
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Key-by-key load. A value that does not fit its field is skipped with
    /// a warning and the remaining keys are kept; a custom preset that does
    /// not parse is dropped on its own. Returns the settings and whether every
    /// entry was kept (saving back is only safe then).
    ///
    /// A missing file gives defaults; an unreadable or non-TOML file is an error.
    pub fn load_lenient(path: &Path) -> Result<(Self, bool)> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok((Self::default(), true));
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let table: toml::Table = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        let (config, complete) = Self::from_table_lenient(table);
        if !complete {
            warn!("Some entries in {} were ignored", path.display());
        }
        Ok((config, complete))
    }

    fn from_table_lenient(table: toml::Table) -> (Self, bool) {
        let mut complete = true;
        let mut kept = toml::Table::new();

        for (key, mut value) in table {
            if key == "custom_presets" {
                if let toml::Value::Array(entries) = &mut value {
                    entries.retain(|entry| match entry.clone().try_into::<CustomPreset>() {
                        Ok(_) => true,
                        Err(e) => {
                            warn!("Skipping invalid custom preset: {}", e);
                            complete = false;
                            false
                        }
                    });
                }
            }

            // Every field has a default, so a one-key document checks just this value
            let mut single = toml::Table::new();
            single.insert(key.clone(), value.clone());
            match toml::Value::Table(single).try_into::<Self>() {
                Ok(_) => {
                    kept.insert(key, value);
                }
                Err(e) => {
                    warn!("Ignoring config key '{}': {}", key, e);
                    complete = false;
                }
            }
        }

        match toml::Value::Table(kept).try_into::<Self>() {
            Ok(config) => (config, complete),
            Err(e) => {
                warn!("Config values do not combine ({}), using defaults", e);
                (Self::default(), false)
            }
        }
    }

    /// Forgiving load for read-only use: whatever [`Config::load_lenient`]
    /// recovers, or defaults plus a warning
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_lenient(path) {
            Ok((config, _)) => config,
            Err(e) => {
                warn!("{:#}; using default settings", e);
                Self::default()
            }
        }
    }

    /// Write atomically: serialize to a sibling temp file, then rename over the target
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let mut tmp_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| CONFIG_FILE.into());
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        fs::write(&tmp_path, contents)
            .with_context(|| format!("Failed to write config file: {}", tmp_path.display()))?;
        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e)
                .with_context(|| format!("Failed to replace config file: {}", path.display()));
        }

        Ok(())
    }

    /// Create a default config file at `path` if none exists. Returns true if created.
    pub fn ensure_default(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        Self::default().save_to(path)?;
        Ok(true)
    }

    pub fn catalog(&self) -> PresetCatalog {
        PresetCatalog::from_custom(self.custom_presets.iter().cloned())
    }

    pub fn set_catalog(&mut self, catalog: &PresetCatalog) {
        self.custom_presets = catalog.custom().to_vec();
    }

    /// Last watermark settings, if any text was set
    pub fn watermark(&self) -> Option<Watermark> {
        if self.watermark_text.trim().is_empty() {
            return None;
        }
        Some(
            Watermark::new(self.watermark_text.clone())
                .with_position(self.watermark_position)
                .with_font_size(self.watermark_size),
        )
    }
}
