// Argument-vector construction for the encoder

use hardsub::engine::{
    Capabilities, Resolution, VideoEncoder, Watermark, WatermarkPosition, build_encode_cmd,
    escape_filter_path,
};
use std::path::PathBuf;
use tempfile::TempDir;

use crate::common::helpers::*;

fn position(args: &[String], token: &str) -> Option<usize> {
    args.iter().position(|a| a == token)
}

fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
    args.windows(2).any(|w| w[0] == flag && w[1] == value)
}

#[test]
fn test_balanced_plain_encode_has_no_filter_graph() {
    let opts = options("/in/show.mkv", "/in/show@converted.mp4", "Balanced");
    let cmd = build_encode_cmd(&Capabilities::default(), &opts);

    assert!(position(&cmd.args, "-filter_complex").is_none());
    assert!(has_pair(&cmd.args, "-map", "0:v"));
    assert!(has_pair(&cmd.args, "-b:v", "3500k"));
    assert!(cmd.filter_graph.is_none());
}

#[test]
fn test_watermark_escapes_colon_and_percent() {
    let mut opts = options("/in/show.mkv", "/in/out.mp4", "Balanced");
    opts.watermark = Some(Watermark::new("Test: 100%"));
    let cmd = build_encode_cmd(&Capabilities::default(), &opts);

    let graph = cmd.filter_graph.as_deref().unwrap();
    assert!(graph.contains(r"Test\: 100\%"));
    assert!(has_pair(&cmd.args, "-map", "[vout]"));
    assert!(!has_pair(&cmd.args, "-map", "0:v"));
}

#[test]
fn test_mapping_switches_with_each_filter_kind() {
    let dir = TempDir::new().unwrap();
    let subtitle = dir.path().join("show.srt");
    touch(&subtitle);

    let base = options("/in/show.mkv", "/in/out.mp4", "Mixdrop");

    let mut with_subtitle = base.clone();
    with_subtitle.subtitle_path = Some(subtitle);

    let mut with_scale = base.clone();
    with_scale.preset.resolution = Resolution::fixed(1280, 720);

    for opts in [with_subtitle, with_scale] {
        let cmd = build_encode_cmd(&Capabilities::default(), &opts);
        assert!(position(&cmd.args, "-filter_complex").is_some());
        assert!(has_pair(&cmd.args, "-map", "[vout]"));
    }

    let cmd = build_encode_cmd(&Capabilities::default(), &base);
    assert!(has_pair(&cmd.args, "-map", "0:v"));
}

#[test]
fn test_subtitle_path_with_colon_is_escaped() {
    let dir = TempDir::new().unwrap();
    let subtitle = dir.path().join("ep: 01's.ass");
    touch(&subtitle);

    let mut opts = options("/in/show.mkv", "/in/out.mp4", "Balanced");
    opts.subtitle_path = Some(subtitle.clone());
    let graph = build_encode_cmd(&Capabilities::default(), &opts)
        .filter_graph
        .unwrap();

    let escaped = escape_filter_path(&subtitle);
    assert!(escaped.contains(r"ep\: 01\'s.ass"));
    assert!(graph.ends_with(&format!("subtitles='{}'[vout]", escaped)));
}

#[test]
fn test_input_and_output_placement() {
    let caps = Capabilities {
        hw_accel: true,
        ..Capabilities::default()
    };
    let opts = options("/in/show.mkv", "/out/show.mp4", "Max Quality");
    let cmd = build_encode_cmd(&caps, &opts);

    let input = position(&cmd.args, "-i").unwrap();
    assert_eq!(&cmd.args[..5], ["-y", "-err_detect", "ignore_err", "-fflags", "+genpts"]);
    assert!(position(&cmd.args, "-hwaccel").unwrap() < input);
    assert!(position(&cmd.args, "-c:v").unwrap() > input);
    assert_eq!(cmd.args.last().map(String::as_str), Some("/out/show.mp4"));
    assert_eq!(cmd.encoder, VideoEncoder::H264Nvenc);
    assert!(has_pair(&cmd.args, "-preset", "p6"));
    assert!(has_pair(&cmd.args, "-b:a", "192k"));
}

#[test]
fn test_user_can_turn_off_hardware() {
    let caps = Capabilities {
        hw_accel: true,
        ..Capabilities::default()
    };
    let mut opts = options("/in/show.mkv", "/out/show.mp4", "Max Quality");
    opts.use_hardware_accel = false;
    let cmd = build_encode_cmd(&caps, &opts);

    assert_eq!(cmd.encoder_label(), "CPU");
    assert!(position(&cmd.args, "-hwaccel").is_none());
    assert!(has_pair(&cmd.args, "-c:v", "libx264"));
    assert!(has_pair(&cmd.args, "-preset", "medium"));
}

#[test]
fn test_identical_inputs_give_identical_argv() {
    let caps = Capabilities {
        hw_accel: true,
        font_path: Some(PathBuf::from("/fonts/a.ttf")),
        ..Capabilities::default()
    };
    let mut opts = options("/in/show.mkv", "/out/show.mp4", "Byse");
    opts.watermark = Some(Watermark::new("line one\nline two").with_position(WatermarkPosition::Center));
    opts.audio_track_index = Some(3);

    let first = build_encode_cmd(&caps, &opts);
    for _ in 0..5 {
        assert_eq!(build_encode_cmd(&caps, &opts).args, first.args);
    }
    assert!(first.filter_graph.unwrap().contains("text='line one line two'"));
}
