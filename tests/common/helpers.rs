#![allow(dead_code)]

use hardsub::engine::{
    ConversionOptions, JobEvent, JobOutcome, PresetCatalog, QualityPreset, wait_for_outcome,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

/// Resolve a built-in or custom preset from a fresh catalog
pub fn preset(name: &str) -> QualityPreset {
    PresetCatalog::new()
        .find(name)
        .unwrap_or_else(|| panic!("no preset named {}", name))
        .resolve()
}

pub fn options(input: &str, output: &str, preset_name: &str) -> ConversionOptions {
    ConversionOptions::new(PathBuf::from(input), PathBuf::from(output), preset(preset_name))
}

/// `sh -c <script>` as program + args
pub fn sh(script: &str) -> (PathBuf, Vec<String>) {
    (
        PathBuf::from("/bin/sh"),
        vec!["-c".to_string(), script.to_string()],
    )
}

/// Every event up to and including the terminal one
pub fn collect_events(rx: &Receiver<JobEvent>) -> (Vec<JobEvent>, JobOutcome) {
    let mut events = Vec::new();
    let outcome = wait_for_outcome(rx, |e| events.push(e.clone()));
    (events, outcome)
}

pub fn percents(events: &[JobEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect()
}

pub fn log_lines(events: &[JobEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Log { line, .. } => Some(line.clone()),
            _ => None,
        })
        .collect()
}

pub fn finished_count(events: &[JobEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, JobEvent::Finished { .. }))
        .count()
}

pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"").unwrap();
}

/// Executable shell script standing in for ffmpeg
#[cfg(unix)]
pub fn fake_encoder(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("ffmpeg");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
