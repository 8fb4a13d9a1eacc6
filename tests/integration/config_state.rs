// Persisted settings: presets and last-used values survive a reload

use hardsub::config::Config;
use hardsub::engine::{PresetBuilder, Resolution, SpeedPreset, WatermarkPosition};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_custom_presets_persist_with_all_fields() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = Config::default();
    let mut catalog = config.catalog();
    catalog.add(
        PresetBuilder::new("Archive")
            .bitrate("8000k")
            .maxrate("9000k")
            .bufsize("16000k")
            .speed(SpeedPreset::P7)
            .resolution(Resolution::fixed(1920, 1080))
            .audio_bitrate("256k")
            .build()
            .unwrap(),
    );
    config.set_catalog(&catalog);
    config.save_to(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("[[custom_presets]]"));
    assert!(text.contains("resolution = \"1920:1080\""));
    assert!(text.contains("speed = \"p7\""));

    let reloaded = Config::load_or_default(&path).catalog();
    let preset = reloaded.find("Archive").unwrap().resolve();
    assert_eq!(preset.bitrate_kbps, 8000);
    assert_eq!(preset.maxrate_kbps, 9000);
    assert_eq!(preset.bufsize_kbps, 16000);
    assert_eq!(preset.audio_bitrate_kbps, 256);
    assert_eq!(preset.speed, SpeedPreset::P7);
}

#[test]
fn test_last_used_values_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = Config::default();
    config.last_preset = "Mixdrop".to_string();
    config.last_video_dir = Some(dir.path().join("videos"));
    config.watermark_text = "example.org".to_string();
    config.watermark_position = WatermarkPosition::Center;
    config.watermark_size = 30;
    config.use_hardware_accel = false;
    config.copy_audio = true;
    config.save_to(&path).unwrap();

    let reloaded = Config::load_or_default(&path);
    assert_eq!(reloaded, config);
    let watermark = reloaded.watermark().unwrap();
    assert_eq!(watermark.position, WatermarkPosition::Center);
    assert_eq!(watermark.font_size, 30);
}

#[test]
fn test_failed_load_never_crashes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    fs::write(&path, "watermark_size = \"big\"\n").unwrap();
    assert_eq!(Config::load_or_default(&path), Config::default());

    fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
    assert_eq!(Config::load_or_default(&path), Config::default());
}

#[test]
fn test_save_replaces_previous_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = Config::default();
    config.save_to(&path).unwrap();
    config.last_preset = "Byse".to_string();
    config.save_to(&path).unwrap();

    assert_eq!(Config::load_from(&path).unwrap().last_preset, "Byse");
    let leftovers: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name() != "config.toml")
        .collect();
    assert!(leftovers.is_empty());
}
