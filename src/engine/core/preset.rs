// Quality presets: built-in streaming ladders plus user-defined entries

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Bitrate used when a token is empty or unreadable
pub const DEFAULT_BITRATE_KBPS: u32 = 3000;

/// Highest rate accepted anywhere (1 Gbit/s); keeps `bitrate * 2` in range
pub const MAX_BITRATE_KBPS: u32 = 1_000_000;

/// Audio bitrate used when a preset does not name one
pub const DEFAULT_AUDIO_BITRATE_KBPS: u32 = 128;

/// Leading digits followed by `k`; anything after is ignored
fn bitrate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)k").expect("valid bitrate regex"))
}

/// Whole-token form accepted from users
fn bitrate_strict_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+k$").expect("valid strict bitrate regex"))
}

/// Parse a bitrate token such as `5000k` into kbps.
/// Returns `None` for empty, malformed, zero or out-of-range tokens.
pub fn parse_bitrate(token: &str) -> Option<u32> {
    let caps = bitrate_pattern().captures(token.trim())?;
    caps[1]
        .parse::<u32>()
        .ok()
        .filter(|kbps| (1..=MAX_BITRATE_KBPS).contains(kbps))
}

/// Format kbps back into the token form ffmpeg accepts
pub fn format_bitrate(kbps: u32) -> String {
    format!("{}k", kbps)
}

/// Check a user-supplied token against `^\d+k$`
pub fn is_valid_bitrate_token(token: &str) -> bool {
    bitrate_strict_pattern().is_match(token)
}

/// Rate-control values in kbps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLadder {
    pub bitrate_kbps: u32,
    pub maxrate_kbps: u32,
    pub bufsize_kbps: u32,
}

/// Canonicalize bitrate/maxrate/bufsize tokens.
///
/// Total over every input: an empty or malformed bitrate becomes
/// [`DEFAULT_BITRATE_KBPS`], an empty or malformed maxrate becomes
/// `bitrate * 1.1`, and an empty or malformed bufsize becomes `bitrate * 2`.
/// The maxrate never drops below the bitrate.
pub fn derive_rates(bitrate: &str, maxrate: &str, bufsize: &str) -> RateLadder {
    let bitrate_kbps = parse_bitrate(bitrate).unwrap_or(DEFAULT_BITRATE_KBPS);

    let default_maxrate = (f64::from(bitrate_kbps) * 1.1).round() as u32;
    let maxrate_kbps = parse_bitrate(maxrate)
        .unwrap_or(default_maxrate)
        .max(bitrate_kbps);

    let bufsize_kbps = parse_bitrate(bufsize).unwrap_or(bitrate_kbps * 2);

    RateLadder {
        bitrate_kbps,
        maxrate_kbps,
        bufsize_kbps,
    }
}

/// NVENC speed/quality tradeoff (p1 = fastest, p7 = slowest/best)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedPreset {
    P1,
    P2,
    P3,
    #[default]
    P4,
    P5,
    P6,
    P7,
}

impl SpeedPreset {
    pub const ALL: [SpeedPreset; 7] = [
        Self::P1,
        Self::P2,
        Self::P3,
        Self::P4,
        Self::P5,
        Self::P6,
        Self::P7,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::P1 => "p1",
            Self::P2 => "p2",
            Self::P3 => "p3",
            Self::P4 => "p4",
            Self::P5 => "p5",
            Self::P6 => "p6",
            Self::P7 => "p7",
        }
    }

    /// Label shown in preset pickers
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::P1 => "p1 (fastest)",
            Self::P4 => "p4 (balanced)",
            Self::P6 => "p6 (slow/best)",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for SpeedPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpeedPreset {
    type Err = PresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept "p6" as well as picker labels like "p6 (slow/best)"
        let token = s.split_whitespace().next().unwrap_or("").to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == token)
            .ok_or_else(|| PresetError::InvalidSpeed(s.to_string()))
    }
}

/// Target frame size. `Source` keeps the input resolution and skips the scale stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Resolution {
    #[default]
    Source,
    Fixed { width: u32, height: u32 },
}

impl Resolution {
    pub fn fixed(width: u32, height: u32) -> Self {
        Self::Fixed { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Fixed { width, height } => write!(f, "{}:{}", width, height),
        }
    }
}

impl FromStr for Resolution {
    type Err = PresetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("source") {
            return Ok(Self::Source);
        }

        let (w, h) = trimmed
            .split_once(':')
            .or_else(|| trimmed.split_once('x'))
            .ok_or_else(|| PresetError::InvalidResolution(s.to_string()))?;

        match (w.trim().parse::<u32>(), h.trim().parse::<u32>()) {
            (Ok(width), Ok(height)) if width > 0 && height > 0 => Ok(Self::fixed(width, height)),
            _ => Err(PresetError::InvalidResolution(s.to_string())),
        }
    }
}

impl TryFrom<String> for Resolution {
    type Error = PresetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

/// Preset validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresetError {
    #[error("Preset name is required")]
    MissingName,

    #[error("Bitrate is required")]
    MissingBitrate,

    #[error("{field} must look like '5000k', got '{value}'")]
    InvalidRate { field: &'static str, value: String },

    #[error("{field} must be between 1k and {max}k, got '{value}'", max = MAX_BITRATE_KBPS)]
    RateOutOfRange { field: &'static str, value: String },

    #[error("'{0}' is a built-in preset name")]
    ReservedName(String),

    #[error("Unknown speed preset '{0}' (expected p1..p7)")]
    InvalidSpeed(String),

    #[error("Invalid resolution '{0}' (expected 'source' or WIDTH:HEIGHT)")]
    InvalidResolution(String),
}

/// Fully resolved preset values, ready for the command builder.
/// Jobs take this by value so later catalog edits never reach a running encode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityPreset {
    pub name: String,
    pub resolution: Resolution,
    pub bitrate_kbps: u32,
    pub maxrate_kbps: u32,
    pub bufsize_kbps: u32,
    pub speed: SpeedPreset,
    pub audio_bitrate_kbps: u32,
}

/// Fixed streaming-host ladder entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinPreset {
    pub name: &'static str,
    pub description: &'static str,
    pub bitrate: &'static str,
    pub maxrate: &'static str,
    pub bufsize: &'static str,
    pub speed: SpeedPreset,
    pub audio_bitrate: &'static str,
}

/// Built-ins, listed in display order
pub const BUILTIN_PRESETS: &[BuiltinPreset] = &[
    BuiltinPreset {
        name: "Max Quality",
        description: "Best compatible quality (5500k)",
        bitrate: "5500k",
        maxrate: "6000k",
        bufsize: "11000k",
        speed: SpeedPreset::P6,
        audio_bitrate: "192k",
    },
    BuiltinPreset {
        name: "Mixdrop",
        description: "Tuned for Mixdrop (4500k)",
        bitrate: "4500k",
        maxrate: "5000k",
        bufsize: "9000k",
        speed: SpeedPreset::P4,
        audio_bitrate: "128k",
    },
    BuiltinPreset {
        name: "Byse",
        description: "Tuned for Byse (4500k)",
        bitrate: "4500k",
        maxrate: "5000k",
        bufsize: "9000k",
        speed: SpeedPreset::P4,
        audio_bitrate: "128k",
    },
    BuiltinPreset {
        name: "Balanced",
        description: "Good size/quality balance (3500k)",
        bitrate: "3500k",
        maxrate: "4000k",
        bufsize: "7000k",
        speed: SpeedPreset::P4,
        audio_bitrate: "128k",
    },
];

fn default_audio_bitrate() -> String {
    format_bitrate(DEFAULT_AUDIO_BITRATE_KBPS)
}

/// User-defined preset as persisted in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomPreset {
    pub name: String,
    #[serde(default)]
    pub resolution: Resolution,
    pub bitrate: String,
    #[serde(default)]
    pub maxrate: String,
    #[serde(default)]
    pub bufsize: String,
    #[serde(default)]
    pub speed: SpeedPreset,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
}

/// A catalog entry: fixed built-in or user-defined
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preset {
    BuiltIn(&'static BuiltinPreset),
    Custom(CustomPreset),
}

impl Preset {
    pub fn name(&self) -> &str {
        match self {
            Self::BuiltIn(b) => b.name,
            Self::Custom(c) => &c.name,
        }
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Self::BuiltIn(_))
    }

    /// Resolve tokens into concrete values. Both variants go through [`derive_rates`].
    pub fn resolve(&self) -> QualityPreset {
        let (name, resolution, bitrate, maxrate, bufsize, speed, audio) = match self {
            Self::BuiltIn(b) => (
                b.name,
                Resolution::Source,
                b.bitrate,
                b.maxrate,
                b.bufsize,
                b.speed,
                b.audio_bitrate,
            ),
            Self::Custom(c) => (
                c.name.as_str(),
                c.resolution,
                c.bitrate.as_str(),
                c.maxrate.as_str(),
                c.bufsize.as_str(),
                c.speed,
                c.audio_bitrate.as_str(),
            ),
        };

        let rates = derive_rates(bitrate, maxrate, bufsize);
        QualityPreset {
            name: name.to_string(),
            resolution,
            bitrate_kbps: rates.bitrate_kbps,
            maxrate_kbps: rates.maxrate_kbps,
            bufsize_kbps: rates.bufsize_kbps,
            speed,
            audio_bitrate_kbps: parse_bitrate(audio).unwrap_or(DEFAULT_AUDIO_BITRATE_KBPS),
        }
    }

    /// One-line summary for listings
    pub fn summary(&self) -> String {
        let q = self.resolve();
        format!(
            "{} | {} | {}k (max {}k, buf {}k) | {} | audio {}k",
            q.name,
            q.resolution,
            q.bitrate_kbps,
            q.maxrate_kbps,
            q.bufsize_kbps,
            q.speed.display_name(),
            q.audio_bitrate_kbps
        )
    }
}

fn builtin(name: &str) -> Option<&'static BuiltinPreset> {
    BUILTIN_PRESETS.iter().find(|b| b.name == name)
}

/// Validating builder for user presets
#[derive(Debug, Clone, Default)]
pub struct PresetBuilder {
    name: String,
    resolution: Resolution,
    bitrate: String,
    maxrate: String,
    bufsize: String,
    speed: SpeedPreset,
    audio_bitrate: String,
}

impl PresetBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn bitrate(mut self, token: impl Into<String>) -> Self {
        self.bitrate = token.into();
        self
    }

    pub fn maxrate(mut self, token: impl Into<String>) -> Self {
        self.maxrate = token.into();
        self
    }

    pub fn bufsize(mut self, token: impl Into<String>) -> Self {
        self.bufsize = token.into();
        self
    }

    pub fn speed(mut self, speed: SpeedPreset) -> Self {
        self.speed = speed;
        self
    }

    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn audio_bitrate(mut self, token: impl Into<String>) -> Self {
        self.audio_bitrate = token.into();
        self
    }

    /// Validate and produce a preset with maxrate/bufsize filled in
    pub fn build(self) -> Result<CustomPreset, PresetError> {
        let name = self.name.trim().to_string();
        if name.is_empty() {
            return Err(PresetError::MissingName);
        }
        if builtin(&name).is_some() {
            return Err(PresetError::ReservedName(name));
        }
        if self.bitrate.trim().is_empty() {
            return Err(PresetError::MissingBitrate);
        }

        for (field, value) in [
            ("Bitrate", &self.bitrate),
            ("Maxrate", &self.maxrate),
            ("Bufsize", &self.bufsize),
            ("Audio bitrate", &self.audio_bitrate),
        ] {
            if value.is_empty() {
                continue;
            }
            if !is_valid_bitrate_token(value) {
                return Err(PresetError::InvalidRate {
                    field,
                    value: value.clone(),
                });
            }
            if parse_bitrate(value).is_none() {
                return Err(PresetError::RateOutOfRange {
                    field,
                    value: value.clone(),
                });
            }
        }

        let rates = derive_rates(&self.bitrate, &self.maxrate, &self.bufsize);
        let audio_bitrate = if self.audio_bitrate.is_empty() {
            default_audio_bitrate()
        } else {
            self.audio_bitrate
        };

        Ok(CustomPreset {
            name,
            resolution: self.resolution,
            bitrate: format_bitrate(rates.bitrate_kbps),
            maxrate: format_bitrate(rates.maxrate_kbps),
            bufsize: format_bitrate(rates.bufsize_kbps),
            speed: self.speed,
            audio_bitrate,
        })
    }
}

/// Built-in presets followed by user presets in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetCatalog {
    custom: Vec<CustomPreset>,
}

impl PresetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted entries; a repeated name keeps the later entry in the earlier slot
    pub fn from_custom(presets: impl IntoIterator<Item = CustomPreset>) -> Self {
        let mut catalog = Self::new();
        for preset in presets {
            catalog.add(preset);
        }
        catalog
    }

    pub fn list(&self) -> Vec<Preset> {
        BUILTIN_PRESETS
            .iter()
            .map(Preset::BuiltIn)
            .chain(self.custom.iter().cloned().map(Preset::Custom))
            .collect()
    }

    pub fn custom(&self) -> &[CustomPreset] {
        &self.custom
    }

    pub fn find(&self, name: &str) -> Option<Preset> {
        if let Some(b) = builtin(name) {
            return Some(Preset::BuiltIn(b));
        }
        self.custom
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .map(Preset::Custom)
    }

    /// Insert, or overwrite in place when the name already exists.
    /// Returns true if an existing entry was replaced.
    pub fn add(&mut self, preset: CustomPreset) -> bool {
        match self.custom.iter_mut().find(|p| p.name == preset.name) {
            Some(existing) => {
                *existing = preset;
                true
            }
            None => {
                self.custom.push(preset);
                false
            }
        }
    }

    /// Remove a user preset. Built-ins cannot be removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.custom.len();
        self.custom.retain(|p| p.name != name);
        self.custom.len() != before
    }
}
