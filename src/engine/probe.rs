// Audio track discovery using ffprobe

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};

use crate::engine::core::language::language_label;
use crate::engine::core::process::wait_timeout;

/// Upper bound for one ffprobe run
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    index: Option<u32>,
    codec_type: Option<String>,
    codec_name: Option<String>,
    channels: Option<u32>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

impl FfprobeStream {
    fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Language tag, then title tag, then channel count, then "unknown"
    fn language(&self) -> String {
        if let Some(code) = self.tag("language").or_else(|| self.tag("title")) {
            return language_label(code);
        }
        match self.channels {
            Some(channels) => format!("{} channels", channels),
            None => "unknown".to_string(),
        }
    }
}

/// One audio stream of an input file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioTrack {
    /// Absolute stream index, as used by `-map 0:<index>`
    pub index: u32,
    /// Upper-cased codec name, e.g. "AAC"
    pub codec: String,
    pub language: String,
}

impl AudioTrack {
    pub fn title(&self) -> String {
        format!("Track {}: {} ({})", self.index, self.language, self.codec)
    }
}

/// Parse `ffprobe -print_format json -show_streams` output into audio tracks.
/// Malformed JSON yields an empty list.
pub fn parse_audio_tracks(json: &str) -> Vec<AudioTrack> {
    let probe: FfprobeOutput = match serde_json::from_str(json) {
        Ok(probe) => probe,
        Err(e) => {
            warn!("Failed to parse ffprobe JSON: {}", e);
            return Vec::new();
        }
    };

    probe
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("audio"))
        .filter_map(|s| {
            Some(AudioTrack {
                index: s.index?,
                codec: s
                    .codec_name
                    .as_deref()
                    .unwrap_or("unk")
                    .to_uppercase(),
                language: s.language(),
            })
        })
        .collect()
}

/// List the audio tracks of `file`. Never fails; any probe problem gives an empty list.
pub fn probe_audio_tracks(prober: &Path, file: &Path) -> Vec<AudioTrack> {
    if !file.is_file() {
        debug!("Skipping probe, {} is not a file", file.display());
        return Vec::new();
    }

    match run_prober(prober, file) {
        Some(json) => parse_audio_tracks(&json),
        None => Vec::new(),
    }
}

fn run_prober(prober: &Path, file: &Path) -> Option<String> {
    let mut child = Command::new(prober)
        .args(["-v", "quiet", "-print_format", "json", "-show_streams"])
        .arg(file)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| warn!("Failed to run {}: {}", prober.display(), e))
        .ok()?;

    // Drain stdout on a side thread so a large report can't stall the prober
    let mut stdout = child.stdout.take()?;
    let reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        stdout.read_to_end(&mut buf).map(|_| buf)
    });

    let status = match wait_timeout(&mut child, PROBE_TIMEOUT) {
        Ok(Some(status)) => status,
        Ok(None) => {
            warn!("ffprobe timed out on {}", file.display());
            let _ = child.kill();
            let _ = child.wait();
            return None;
        }
        Err(e) => {
            warn!("Failed to wait for ffprobe: {}", e);
            let _ = child.kill();
            return None;
        }
    };

    let output = reader.join().ok()?.ok()?;
    if !status.success() {
        debug!("ffprobe exited with {} for {}", status, file.display());
        return None;
    }

    Some(String::from_utf8_lossy(&output).into_owned())
}
