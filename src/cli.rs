use clap::{Args, Parser, Subcommand};
use hardsub::engine::core::{Resolution, SpeedPreset, WatermarkPosition};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hardsub")]
#[command(about = "Burn subtitles and watermarks into videos with ffmpeg", long_about = None)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by `encode` and `batch`. Anything left out falls back to the config.
#[derive(Args, Debug, Clone, Default)]
pub struct EncodeArgs {
    /// Quality preset name (see `presets list`)
    #[arg(long)]
    pub preset: Option<String>,

    /// Watermark text burned into the video
    #[arg(long, conflicts_with = "no_watermark")]
    pub watermark: Option<String>,

    /// Do not draw a watermark even if one is configured
    #[arg(long)]
    pub no_watermark: bool,

    /// Watermark position: top, center or bottom
    #[arg(long)]
    pub position: Option<WatermarkPosition>,

    /// Watermark font size
    #[arg(long, value_parser = clap::value_parser!(u32).range(10..=72))]
    pub font_size: Option<u32>,

    /// Audio stream index to keep (default: all audio streams)
    #[arg(long)]
    pub audio_track: Option<u32>,

    /// Map every audio stream even if a track is configured
    #[arg(long, conflicts_with = "audio_track")]
    pub all_audio: bool,

    /// Use the software encoder even if NVENC is available
    #[arg(long, conflicts_with = "hw")]
    pub no_hw: bool,

    /// Use NVENC when available (overrides config)
    #[arg(long)]
    pub hw: bool,

    /// Copy audio streams instead of re-encoding to AAC
    #[arg(long, conflicts_with = "reencode_audio")]
    pub copy_audio: bool,

    /// Re-encode audio to AAC (overrides config)
    #[arg(long)]
    pub reencode_audio: bool,

    /// Do not copy source metadata
    #[arg(long, conflicts_with = "metadata")]
    pub no_metadata: bool,

    /// Copy source metadata (overrides config)
    #[arg(long)]
    pub metadata: bool,

    /// Print the ffmpeg command without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Append encoder output to this file with timestamps
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Encode one video
    Encode {
        /// Input video
        input: PathBuf,

        /// Output file (default: <input>@converted.mp4 next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Subtitle file to burn in (default: sibling .srt/.ass/.ssa if enabled)
        #[arg(long, conflicts_with = "no_subtitle")]
        subtitle: Option<PathBuf>,

        /// Do not burn in any subtitle
        #[arg(long)]
        no_subtitle: bool,

        #[command(flatten)]
        options: EncodeArgs,
    },

    /// Encode several videos one after another (files or directories)
    Batch {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Directory for outputs (default: next to each input)
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Do not auto-detect sibling subtitles
        #[arg(long)]
        no_subtitle: bool,

        #[command(flatten)]
        options: EncodeArgs,
    },

    /// List the audio tracks of a video
    Probe {
        /// Path to the video file
        file: PathBuf,
    },

    /// Show detected encoder, prober, GPU and font
    Check,

    /// Manage quality presets
    Presets {
        #[command(subcommand)]
        action: PresetAction,
    },

    /// Show config status and location, or create default config if missing
    InitConfig,
}

#[derive(Subcommand)]
pub enum PresetAction {
    /// List built-in and custom presets
    List,

    /// Add a custom preset, replacing one with the same name
    Add {
        name: String,

        /// Target bitrate, e.g. 4000k
        #[arg(long)]
        bitrate: String,

        /// Peak bitrate (default: bitrate x 1.1)
        #[arg(long)]
        maxrate: Option<String>,

        /// Rate-control buffer (default: bitrate x 2)
        #[arg(long)]
        bufsize: Option<String>,

        /// NVENC speed preset p1 (fastest) .. p7 (slowest)
        #[arg(long, default_value = "p4")]
        speed: SpeedPreset,

        /// "source" or WIDTH:HEIGHT
        #[arg(long, default_value = "source")]
        resolution: Resolution,

        /// Audio bitrate, e.g. 128k
        #[arg(long)]
        audio_bitrate: Option<String>,
    },

    /// Remove a custom preset
    Remove { name: String },
}

pub fn parse() -> Cli {
    Cli::parse()
}
