mod ffmpeg_cmd;
mod ffmpeg_info;
pub mod language;
mod log;
pub mod preset;
pub mod process;
mod progress;
mod scan;
mod types;

pub use ffmpeg_cmd::{
    CommandError, EncodeCommand, build_encode_cmd, escape_filter_path, escape_filter_text,
    filter_stages, format_command, require_encoder, validate_options,
};
pub use ffmpeg_info::binary_version;
pub use log::JobLog;
pub use preset::{
    BUILTIN_PRESETS, BuiltinPreset, CustomPreset, Preset, PresetBuilder, PresetCatalog,
    PresetError, QualityPreset, RateLadder, Resolution, SpeedPreset, derive_rates,
};
pub use process::{exit_code, request_terminate, wait_timeout};
pub use progress::{MAX_PARSED_PERCENT, OutputLines, ProgressParser, is_progress_line};
pub use scan::{
    collect_inputs, derive_output_path, derive_output_path_in, detect_subtitle, is_video_file,
    sanitize_file_stem, scan, scan_streaming,
};
pub use types::{
    ConversionOptions, DEFAULT_WATERMARK_SIZE, JobEvent, JobOutcome, JobState, Watermark,
    WatermarkPosition,
};
