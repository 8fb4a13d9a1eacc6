use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::preset::{QualityPreset, Resolution};
use super::types::{ConversionOptions, Watermark};
use crate::engine::hardware::{Capabilities, VideoEncoder};

/// Speed preset used for the software encoder regardless of the preset's NVENC token
const SOFTWARE_SPEED_PRESET: &str = "medium";
const AUDIO_CODEC: &str = "aac";
const VIDEO_PROFILE: &str = "high";
const PIXEL_FORMAT: &str = "yuv420p";
const FILTER_OUTPUT_LABEL: &str = "[vout]";

/// Problems detected before a job is started
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("ffmpeg was not found; install it or set encoder_path in the config")]
    EncoderNotFound,
    #[error("input file does not exist: {0}")]
    InputNotFound(PathBuf),
    #[error("output path must differ from the input: {0}")]
    OutputIsInput(PathBuf),
}

/// A fully built encoder invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeCommand {
    /// Arguments after the program name, in final order
    pub args: Vec<String>,
    pub encoder: VideoEncoder,
    /// The `-filter_complex` graph, if any stage was active
    pub filter_graph: Option<String>,
}

impl EncodeCommand {
    /// Short encoder label for status displays ("NVENC" / "CPU")
    pub fn encoder_label(&self) -> &'static str {
        self.encoder.label()
    }

    /// Shell-quoted rendering for logs
    pub fn display(&self, program: &Path) -> String {
        format_command(program.as_os_str(), &self.args)
    }
}

/// Render a program and its args as one shell-safe line
pub fn format_command(program: &OsStr, args: &[String]) -> String {
    let program = program.to_string_lossy();
    let words = std::iter::once(program.as_ref()).chain(args.iter().map(String::as_str));
    match shlex::try_join(words.clone()) {
        Ok(line) => line,
        // Only fails on interior NUL bytes
        Err(_) => words.collect::<Vec<_>>().join(" "),
    }
}

/// Resolved encoder path or a configuration error
pub fn require_encoder(caps: &Capabilities) -> Result<&Path, CommandError> {
    caps.encoder_path
        .as_deref()
        .ok_or(CommandError::EncoderNotFound)
}

/// Pre-flight checks that must pass before a job may start
pub fn validate_options(opts: &ConversionOptions) -> Result<(), CommandError> {
    if !opts.input_path.is_file() {
        return Err(CommandError::InputNotFound(opts.input_path.clone()));
    }
    if opts.output_path == opts.input_path {
        return Err(CommandError::OutputIsInput(opts.output_path.clone()));
    }
    Ok(())
}

// ============================================================================
// Filter escaping
// ============================================================================

/// Escape free text for a drawtext `text='...'` value.
/// Newlines collapse to a single space.
pub fn escape_filter_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\\\\\"),
            ':' => out.push_str("\\:"),
            '\'' => out.push_str("\\'"),
            '%' => out.push_str("\\%"),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push(' ');
            }
            '\n' => out.push(' '),
            other => out.push(other),
        }
    }
    out
}

/// Escape a file path for use inside a quoted filter option
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

// ============================================================================
// Filter stages
// ============================================================================

fn scale_filter(resolution: &Resolution) -> Option<String> {
    match resolution {
        Resolution::Source => None,
        Resolution::Fixed { width, height } => {
            let res = format!("{}:{}", width, height);
            Some(format!(
                "scale={res}:force_original_aspect_ratio=decrease,pad={res}:(ow-iw)/2:(oh-ih)/2"
            ))
        }
    }
}

fn drawtext_filter(watermark: &Watermark, font: Option<&Path>) -> Option<String> {
    if watermark.text.is_empty() {
        return None;
    }

    let mut filter = String::from("drawtext=");
    if let Some(font) = font {
        filter.push_str(&format!("fontfile='{}':", escape_filter_path(font)));
    }
    filter.push_str(&format!(
        "text='{}':fontcolor=white@0.9:fontsize={}:box=1:boxcolor=black@0.4:boxborderw=10:x=(w-text_w)/2:{}",
        escape_filter_text(&watermark.text),
        watermark.font_size,
        watermark.position.y_expr()
    ));
    Some(filter)
}

fn subtitle_filter(subtitle: &Path) -> Option<String> {
    if !subtitle.is_file() {
        return None;
    }
    Some(format!("subtitles='{}'", escape_filter_path(subtitle)))
}

/// Active filter stages in their fixed order: scale, watermark, subtitles
pub fn filter_stages(
    caps: &Capabilities,
    preset: &QualityPreset,
    opts: &ConversionOptions,
) -> Vec<String> {
    let mut stages = Vec::new();
    stages.extend(scale_filter(&preset.resolution));
    if let Some(watermark) = &opts.watermark {
        stages.extend(drawtext_filter(watermark, caps.font_path.as_deref()));
    }
    if let Some(subtitle) = &opts.subtitle_path {
        stages.extend(subtitle_filter(subtitle));
    }
    stages
}

// ============================================================================
// Builder
// ============================================================================

/// Build the full encoder argument vector for one job.
///
/// Output depends only on the inputs plus whether the subtitle file exists
/// at call time. Input-side options (`-hwaccel`) precede `-i`; everything
/// else applies to the output.
pub fn build_encode_cmd(caps: &Capabilities, opts: &ConversionOptions) -> EncodeCommand {
    let preset = &opts.preset;
    let encoder = VideoEncoder::select(opts.use_hardware_accel, caps.hw_accel);
    let mut args: Vec<String> = Vec::with_capacity(48);

    let mut push = |items: &[&str]| args.extend(items.iter().map(|s| s.to_string()));

    // Global tolerance and timestamp regeneration
    push(&["-y", "-err_detect", "ignore_err", "-fflags", "+genpts"]);

    if encoder.is_hardware() {
        push(&["-hwaccel", "cuda"]);
    }

    args.push("-i".to_string());
    args.push(opts.input_path.to_string_lossy().into_owned());

    let stages = filter_stages(caps, preset, opts);
    let filter_graph = if stages.is_empty() {
        args.extend(["-map".to_string(), "0:v".to_string()]);
        None
    } else {
        let graph = format!("[0:v]{}{}", stages.join(","), FILTER_OUTPUT_LABEL);
        args.extend([
            "-filter_complex".to_string(),
            graph.clone(),
            "-map".to_string(),
            FILTER_OUTPUT_LABEL.to_string(),
        ]);
        Some(graph)
    };

    args.push("-map".to_string());
    args.push(match opts.audio_track_index {
        Some(index) => format!("0:{}", index),
        None => "0:a?".to_string(),
    });

    args.push("-c:v".to_string());
    args.push(encoder.ffmpeg_name().to_string());
    args.push("-preset".to_string());
    args.push(if encoder.is_hardware() {
        preset.speed.as_str().to_string()
    } else {
        SOFTWARE_SPEED_PRESET.to_string()
    });

    if opts.copy_audio {
        args.extend(["-c:a".to_string(), "copy".to_string()]);
    } else {
        args.extend([
            "-c:a".to_string(),
            AUDIO_CODEC.to_string(),
            "-b:a".to_string(),
            format!("{}k", preset.audio_bitrate_kbps),
        ]);
    }

    args.extend([
        "-rc".to_string(),
        "vbr".to_string(),
        "-b:v".to_string(),
        format!("{}k", preset.bitrate_kbps),
        "-maxrate".to_string(),
        format!("{}k", preset.maxrate_kbps),
        "-bufsize".to_string(),
        format!("{}k", preset.bufsize_kbps),
        "-profile:v".to_string(),
        VIDEO_PROFILE.to_string(),
        "-pix_fmt".to_string(),
        PIXEL_FORMAT.to_string(),
    ]);

    if opts.preserve_metadata {
        args.extend(["-map_metadata".to_string(), "0".to_string()]);
    }

    args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    args.push(opts.output_path.to_string_lossy().into_owned());

    EncodeCommand {
        args,
        encoder,
        filter_graph,
    }
}
