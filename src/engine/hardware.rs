//! Host capability detection: NVENC availability, encoder/prober binaries, watermark font

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::engine::core::process::wait_timeout;

/// Upper bound for the GPU diagnostic command
pub const HW_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

const ENCODER_NAME: &str = "ffmpeg";
const PROBER_NAME: &str = "ffprobe";

// ============================================================================
// Video Encoder Selection
// ============================================================================

/// Video encoders the command builder can pick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoEncoder {
    Libx264,  // Software H.264
    H264Nvenc, // NVIDIA NVENC H.264
}

impl VideoEncoder {
    /// Pick NVENC only when the user asked for it and the host has it
    pub fn select(use_hardware: bool, hw_available: bool) -> Self {
        if use_hardware && hw_available {
            Self::H264Nvenc
        } else {
            Self::Libx264
        }
    }

    /// Get the FFmpeg encoder name
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::Libx264 => "libx264",
            Self::H264Nvenc => "h264_nvenc",
        }
    }

    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::H264Nvenc)
    }

    /// Short label for status displays
    pub fn label(&self) -> &'static str {
        match self {
            Self::Libx264 => "CPU",
            Self::H264Nvenc => "NVENC",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Libx264 => "libx264 (Software)",
            Self::H264Nvenc => "H.264 NVENC (NVIDIA)",
        }
    }
}

// ============================================================================
// Detection
// ============================================================================

/// Run a diagnostic command; true only for a zero exit within `timeout`.
/// Launch failures and timeouts count as "no".
pub fn command_succeeds_within(mut cmd: Command, timeout: Duration) -> bool {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            debug!("Diagnostic {:?} could not start: {}", cmd.get_program(), e);
            return false;
        }
    };

    match wait_timeout(&mut child, timeout) {
        Ok(Some(status)) => status.success(),
        Ok(None) => {
            debug!("Diagnostic {:?} timed out", cmd.get_program());
            let _ = child.kill();
            let _ = child.wait();
            false
        }
        Err(e) => {
            debug!("Diagnostic {:?} wait failed: {}", cmd.get_program(), e);
            let _ = child.kill();
            false
        }
    }
}

/// Check for a usable NVIDIA GPU (for NVENC and CUDA decode) via nvidia-smi
pub fn detect_hardware_accel() -> bool {
    command_succeeds_within(Command::new("nvidia-smi"), HW_PROBE_TIMEOUT)
}

fn binary_file_name(name: &str) -> String {
    format!("{}{}", name, std::env::consts::EXE_SUFFIX)
}

/// Directory holding a bundled ffmpeg: the one containing our own executable
pub fn bundled_binary_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// Locate ffmpeg: bundled copy first, then PATH
pub fn resolve_encoder_binary(bundle_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(dir) = bundle_dir {
        let local = dir.join(binary_file_name(ENCODER_NAME));
        if local.is_file() {
            return Some(local);
        }
    }
    which::which(ENCODER_NAME).ok()
}

/// Sibling prober path for an encoder binary (`/opt/ff/ffmpeg` -> `/opt/ff/ffprobe`)
pub fn prober_path_for(encoder: &Path) -> Option<PathBuf> {
    let file_name = encoder.file_name()?.to_str()?;
    if !file_name.contains(ENCODER_NAME) {
        return None;
    }
    Some(encoder.with_file_name(file_name.replacen(ENCODER_NAME, PROBER_NAME, 1)))
}

/// Locate ffprobe next to the encoder, falling back to PATH
pub fn resolve_prober_binary(encoder: Option<&Path>) -> Option<PathBuf> {
    encoder
        .and_then(prober_path_for)
        .filter(|p| p.is_file())
        .or_else(|| which::which(PROBER_NAME).ok())
}

/// Platform font candidates, in preference order
pub fn font_candidates() -> &'static [&'static str] {
    if cfg!(target_os = "windows") {
        &[
            "C:/Windows/Fonts/arial.ttf",
            "C:/Windows/Fonts/segoeui.ttf",
            "C:/Windows/Fonts/calibri.ttf",
        ]
    } else if cfg!(target_os = "macos") {
        &[
            "/Library/Fonts/Arial.ttf",
            "/System/Library/Fonts/Helvetica.ttc",
            "/System/Library/Fonts/Supplemental/Arial.ttf",
        ]
    } else {
        &[
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
        ]
    }
}

/// First existing file among `candidates`
pub fn resolve_font_from<P: AsRef<Path>>(candidates: &[P]) -> Option<PathBuf> {
    candidates
        .iter()
        .map(|p| p.as_ref())
        .find(|p| p.is_file())
        .map(Path::to_path_buf)
}

/// Font used for watermark text; `None` lets drawtext use its default
pub fn resolve_font_path() -> Option<PathBuf> {
    resolve_font_from(font_candidates())
}

// ============================================================================
// Capability snapshot
// ============================================================================

/// Host capabilities, computed once at startup and passed to the components
/// that need them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub hw_accel: bool,
    pub encoder_path: Option<PathBuf>,
    pub prober_path: Option<PathBuf>,
    pub font_path: Option<PathBuf>,
}

impl Capabilities {
    /// Probe the host. Runs external commands and may take a few seconds.
    pub fn detect(encoder_override: Option<&Path>) -> Self {
        let encoder_path = resolve_encoder_with_override(encoder_override);
        let prober_path = resolve_prober_binary(encoder_path.as_deref());
        let caps = Self {
            hw_accel: detect_hardware_accel(),
            encoder_path,
            prober_path,
            font_path: resolve_font_path(),
        };
        info!(
            hw_accel = caps.hw_accel,
            encoder = ?caps.encoder_path,
            prober = ?caps.prober_path,
            font = ?caps.font_path,
            "Capabilities detected"
        );
        caps
    }

    /// Encoder a job would get with the given hardware preference
    pub fn encoder_for(&self, use_hardware: bool) -> VideoEncoder {
        VideoEncoder::select(use_hardware, self.hw_accel)
    }
}

fn resolve_encoder_with_override(encoder_override: Option<&Path>) -> Option<PathBuf> {
    match encoder_override.filter(|p| !p.as_os_str().is_empty()) {
        Some(path) if path.is_file() => Some(path.to_path_buf()),
        Some(path) => {
            warn!(
                "Configured encoder {} does not exist, falling back to auto-detection",
                path.display()
            );
            resolve_encoder_binary(bundled_binary_dir().as_deref())
        }
        None => resolve_encoder_binary(bundled_binary_dir().as_deref()),
    }
}
