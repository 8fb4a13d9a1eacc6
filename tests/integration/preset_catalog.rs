// Preset catalog workflows: add, overwrite, remove, resolve

use hardsub::engine::{
    BUILTIN_PRESETS, PresetBuilder, PresetCatalog, PresetError, Resolution, SpeedPreset,
};

#[test]
fn test_adding_same_name_twice_keeps_one_entry_with_second_bitrate() {
    let mut catalog = PresetCatalog::new();
    assert!(!catalog.add(PresetBuilder::new("X").bitrate("2000k").build().unwrap()));
    assert!(catalog.add(PresetBuilder::new("X").bitrate("3000k").build().unwrap()));

    let named_x: Vec<_> = catalog.list().into_iter().filter(|p| p.name() == "X").collect();
    assert_eq!(named_x.len(), 1);
    assert_eq!(named_x[0].resolve().bitrate_kbps, 3000);
}

#[test]
fn test_list_is_builtins_then_custom_in_insertion_order() {
    let mut catalog = PresetCatalog::new();
    for name in ["Zeta", "Alpha", "Mid"] {
        catalog.add(PresetBuilder::new(name).bitrate("1000k").build().unwrap());
    }

    let names: Vec<String> = catalog.list().iter().map(|p| p.name().to_string()).collect();
    let builtins: Vec<&str> = BUILTIN_PRESETS.iter().map(|b| b.name).collect();
    assert_eq!(names[..builtins.len()], builtins[..]);
    assert_eq!(
        names[builtins.len()..],
        ["Zeta".to_string(), "Alpha".to_string(), "Mid".to_string()]
    );
}

#[test]
fn test_overwrite_keeps_position() {
    let mut catalog = PresetCatalog::new();
    for name in ["A", "B", "C"] {
        catalog.add(PresetBuilder::new(name).bitrate("1000k").build().unwrap());
    }
    catalog.add(PresetBuilder::new("B").bitrate("7000k").build().unwrap());

    let custom: Vec<&str> = catalog.custom().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(custom, ["A", "B", "C"]);
    assert_eq!(catalog.custom()[1].bitrate, "7000k");
}

#[test]
fn test_custom_preset_derivation() {
    let preset = PresetBuilder::new("Anime 720p")
        .bitrate("2000k")
        .speed(SpeedPreset::P1)
        .resolution(Resolution::fixed(1280, 720))
        .build()
        .unwrap();
    let mut catalog = PresetCatalog::new();
    catalog.add(preset);

    let resolved = catalog.find("Anime 720p").unwrap().resolve();
    assert_eq!(resolved.bitrate_kbps, 2000);
    assert_eq!(resolved.maxrate_kbps, 2200);
    assert_eq!(resolved.bufsize_kbps, 4000);
    assert_eq!(resolved.audio_bitrate_kbps, 128);
    assert_eq!(resolved.speed, SpeedPreset::P1);
    assert_eq!(resolved.resolution, Resolution::fixed(1280, 720));
}

#[test]
fn test_validation_rejects_bad_tokens() {
    assert_eq!(
        PresetBuilder::new("").bitrate("1000k").build(),
        Err(PresetError::MissingName)
    );
    assert_eq!(PresetBuilder::new("A").build(), Err(PresetError::MissingBitrate));
    assert!(matches!(
        PresetBuilder::new("A").bitrate("1000").build(),
        Err(PresetError::InvalidRate { .. })
    ));
    assert!(matches!(
        PresetBuilder::new("A").bitrate("1000k").maxrate("fast").build(),
        Err(PresetError::InvalidRate { field: "Maxrate", .. })
    ));
    assert!(matches!(
        PresetBuilder::new("A").bitrate("3000000000k").build(),
        Err(PresetError::RateOutOfRange { field: "Bitrate", .. })
    ));
    assert!(matches!(
        PresetBuilder::new("A").bitrate("0k").build(),
        Err(PresetError::RateOutOfRange { field: "Bitrate", .. })
    ));
    assert_eq!(
        PresetBuilder::new("Balanced").bitrate("1000k").build(),
        Err(PresetError::ReservedName("Balanced".to_string()))
    );
}

#[test]
fn test_remove_only_touches_custom_presets() {
    let mut catalog = PresetCatalog::new();
    catalog.add(PresetBuilder::new("Mine").bitrate("1000k").build().unwrap());

    assert!(!catalog.remove("Balanced"));
    assert!(catalog.find("Balanced").is_some());
    assert!(catalog.remove("Mine"));
    assert!(!catalog.remove("Mine"));
    assert!(catalog.find("Mine").is_none());
}

#[test]
fn test_listing_summary() {
    let catalog = PresetCatalog::new();
    assert_eq!(
        catalog.find("Max Quality").unwrap().summary(),
        "Max Quality | source | 5500k (max 6000k, buf 11000k) | p6 (slow/best) | audio 192k"
    );
}
