// ffmpeg console output parsing: line splitting and percentage tracking

use regex::Regex;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::sync::OnceLock;

/// Ceiling for parsed progress; 100 is reserved for the runner's final report
pub const MAX_PARSED_PERCENT: u8 = 99;

fn duration_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"Duration: (\d{2}):(\d{2}):(\d{2}\.\d{2})").expect("valid duration regex")
    })
}

fn time_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"time=(\d{2}):(\d{2}):(\d{2}\.\d{2})").expect("valid time regex")
    })
}

/// Lines carrying `time=` are stats updates; the runner keeps them out of the log
pub fn is_progress_line(line: &str) -> bool {
    line.contains("time=")
}

fn hms_to_seconds(caps: &regex::Captures<'_>) -> Option<f64> {
    let h: f64 = caps[1].parse().ok()?;
    let m: f64 = caps[2].parse().ok()?;
    let s: f64 = caps[3].parse().ok()?;
    Some(h * 3600.0 + m * 60.0 + s)
}

/// Stateful parser for one job's console output.
///
/// Latches the first `Duration:` announcement, then turns each `time=` update
/// into a floored percentage capped at [`MAX_PARSED_PERCENT`]. Only values above
/// the last reported one are returned. Create a fresh parser per job.
#[derive(Debug, Default, Clone)]
pub struct ProgressParser {
    total_duration_s: Option<f64>,
    last_percent: Option<u8>,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line. Returns a percentage when it advanced past the last one reported.
    pub fn parse_line(&mut self, line: &str) -> Option<u8> {
        let Some(total) = self.total_duration_s else {
            // Without a denominator, time updates mean nothing yet
            if line.contains("Duration:") {
                if let Some(caps) = duration_pattern().captures(line) {
                    self.total_duration_s = hms_to_seconds(&caps).filter(|d| *d > 0.0);
                }
            }
            return None;
        };

        if !is_progress_line(line) {
            return None;
        }

        let caps = time_pattern().captures(line)?;
        let current = hms_to_seconds(&caps)?;
        let percent = ((current / total) * 100.0)
            .floor()
            .clamp(0.0, f64::from(MAX_PARSED_PERCENT)) as u8;

        if self.last_percent.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last_percent = Some(percent);
        Some(percent)
    }

    /// Total input duration in seconds, once announced
    pub fn duration_s(&self) -> Option<f64> {
        self.total_duration_s
    }

    pub fn last_percent(&self) -> Option<u8> {
        self.last_percent
    }
}

/// Splits a byte stream into lines on `\n` or `\r` (ffmpeg rewrites its stats
/// line with carriage returns). Bytes that are not UTF-8 are replaced, and empty
/// segments are skipped.
pub struct OutputLines<R> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    finished: bool,
}

impl<R: Read> OutputLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            pending: Vec::new(),
            finished: false,
        }
    }

    fn take_pending(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(line)
    }
}

impl<R: Read> Iterator for OutputLines<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        while !self.finished {
            let available = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => {
                    self.finished = true;
                    break;
                }
            };

            if available.is_empty() {
                self.finished = true;
                break;
            }

            match available.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(pos) => {
                    self.pending.extend_from_slice(&available[..pos]);
                    self.reader.consume(pos + 1);
                    if let Some(line) = self.take_pending() {
                        return Some(line);
                    }
                }
                None => {
                    let len = available.len();
                    self.pending.extend_from_slice(available);
                    self.reader.consume(len);
                }
            }
        }

        self.take_pending()
    }
}
