use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use super::preset::QualityPreset;

/// Default watermark font size in points
pub const DEFAULT_WATERMARK_SIZE: u32 = 22;

/// Vertical placement of the watermark text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkPosition {
    #[default]
    Top,
    Center,
    Bottom,
}

impl WatermarkPosition {
    /// drawtext `y=` expression for this position
    pub fn y_expr(&self) -> &'static str {
        match self {
            Self::Top => "y=20",
            Self::Center => "y=(h-text_h)/2",
            Self::Bottom => "y=h-text_h-20",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Center => "center",
            Self::Bottom => "bottom",
        }
    }
}

impl fmt::Display for WatermarkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatermarkPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "top" => Ok(Self::Top),
            "center" | "centre" | "middle" => Ok(Self::Center),
            "bottom" => Ok(Self::Bottom),
            other => Err(format!(
                "unknown watermark position '{}' (expected top, center or bottom)",
                other
            )),
        }
    }
}

/// Burned-in text overlay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Watermark {
    pub text: String,
    pub position: WatermarkPosition,
    pub font_size: u32,
}

impl Watermark {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            position: WatermarkPosition::default(),
            font_size: DEFAULT_WATERMARK_SIZE,
        }
    }

    pub fn with_position(mut self, position: WatermarkPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_font_size(mut self, font_size: u32) -> Self {
        self.font_size = font_size;
        self
    }
}

/// Everything one encode needs. Built by the caller, then handed to the
/// command builder by reference and never mutated while the job runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionOptions {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    /// Copied at submission time
    pub preset: QualityPreset,
    pub subtitle_path: Option<PathBuf>,
    pub watermark: Option<Watermark>,
    /// `None` maps every audio stream (optional mapping)
    pub audio_track_index: Option<u32>,
    pub use_hardware_accel: bool,
    pub copy_audio: bool,
    pub preserve_metadata: bool,
}

impl ConversionOptions {
    /// Defaults: hardware encoder on, audio re-encoded, metadata kept
    pub fn new(input_path: PathBuf, output_path: PathBuf, preset: QualityPreset) -> Self {
        Self {
            input_path,
            output_path,
            preset,
            subtitle_path: None,
            watermark: None,
            audio_track_index: None,
            use_hardware_accel: true,
            copy_audio: false,
            preserve_metadata: true,
        }
    }
}

/// Job Runner lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Idle,
    Running,
    Succeeded,
    Failed(i32),
    Cancelled,
    LaunchFailed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Idle | Self::Running)
    }
}

/// Terminal result of one job; exactly one is reported per job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Succeeded {
        output_path: PathBuf,
        size_bytes: Option<u64>,
    },
    Failed {
        code: i32,
    },
    Cancelled,
    LaunchFailed {
        reason: String,
    },
}

impl JobOutcome {
    /// Integer form: 0 success, the exit code on failure, -2 cancelled, -1 launch failure
    pub fn code(&self) -> i32 {
        match self {
            Self::Succeeded { .. } => 0,
            Self::Failed { code } => *code,
            Self::Cancelled => -2,
            Self::LaunchFailed { .. } => -1,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn state(&self) -> JobState {
        match self {
            Self::Succeeded { .. } => JobState::Succeeded,
            Self::Failed { code } => JobState::Failed(*code),
            Self::Cancelled => JobState::Cancelled,
            Self::LaunchFailed { .. } => JobState::LaunchFailed,
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded {
                output_path,
                size_bytes,
            } => {
                write!(f, "succeeded: {}", output_path.display())?;
                if let Some(bytes) = size_bytes {
                    write!(f, " ({:.2} MB)", *bytes as f64 / (1024.0 * 1024.0))?;
                }
                Ok(())
            }
            Self::Failed { code } => write!(f, "failed (exit code {})", code),
            Self::Cancelled => f.write_str("cancelled"),
            Self::LaunchFailed { reason } => write!(f, "could not start encoder: {}", reason),
        }
    }
}

/// Message from a job's worker thread to the caller, delivered in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// Completion percentage, non-decreasing within a job
    Progress { job_id: Uuid, percent: u8 },

    /// Raw encoder output line (progress lines excluded)
    Log { job_id: Uuid, line: String },

    /// Always the last event for a job
    Finished { job_id: Uuid, outcome: JobOutcome },
}

impl JobEvent {
    pub fn job_id(&self) -> Uuid {
        match self {
            Self::Progress { job_id, .. }
            | Self::Log { job_id, .. }
            | Self::Finished { job_id, .. } => *job_id,
        }
    }
}
