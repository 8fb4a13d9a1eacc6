// Sequential batch queue driven by a fake encoder script

use crate::common::helpers::*;
use hardsub::engine::{BatchRunner, Capabilities, JobEvent, JobOutcome};
use std::fs;
use tempfile::TempDir;

/// Writes "data\n" to the last argument (the output path)
#[cfg(unix)]
const WRITE_OUTPUT: &str = r#"for last; do :; done
case "$*" in *broken*) echo "moov atom not found" >&2; exit 1;; esac
echo data > "$last""#;

#[cfg(unix)]
#[test]
fn test_batch_runs_jobs_in_order() {
    let dir = TempDir::new().unwrap();
    let encoder = fake_encoder(dir.path(), WRITE_OUTPUT);

    let jobs: Vec<_> = ["one", "two", "three"]
        .iter()
        .map(|name| {
            let input = dir.path().join(format!("{}.mkv", name));
            touch(&input);
            let output = dir.path().join(format!("{}@converted.mp4", name));
            options(input.to_str().unwrap(), output.to_str().unwrap(), "Balanced")
        })
        .collect();

    let runner = BatchRunner::new(encoder, Capabilities::default());
    let mut finished_positions = Vec::new();
    let summary = runner.run(jobs, |position, event| {
        if matches!(event, JobEvent::Finished { .. }) {
            finished_positions.push(position);
        }
    });

    assert_eq!(finished_positions, [0, 1, 2]);
    assert_eq!(summary.succeeded(), 3);
    assert_eq!(summary.failed(), 0);
    assert_eq!(summary.skipped, 0);
    assert!(!summary.was_cancelled());

    for item in &summary.items {
        let JobOutcome::Succeeded { output_path, size_bytes } = &item.outcome else {
            panic!("unexpected outcome {:?}", item.outcome);
        };
        assert_eq!(*size_bytes, Some(5));
        assert_eq!(fs::read_to_string(output_path).unwrap(), "data\n");
    }
}

#[cfg(unix)]
#[test]
fn test_failed_job_does_not_stop_batch() {
    let dir = TempDir::new().unwrap();
    let encoder = fake_encoder(dir.path(), WRITE_OUTPUT);

    let jobs: Vec<_> = ["good", "broken", "fine"]
        .iter()
        .map(|name| {
            let input = dir.path().join(format!("{}.mkv", name));
            touch(&input);
            let output = dir.path().join(format!("{}@converted.mp4", name));
            options(input.to_str().unwrap(), output.to_str().unwrap(), "Balanced")
        })
        .collect();

    let runner = BatchRunner::new(encoder, Capabilities::default());
    let mut logs = Vec::new();
    let summary = runner.run(jobs, |position, event| {
        if let JobEvent::Log { line, .. } = event {
            logs.push((position, line.clone()));
        }
    });

    assert_eq!(summary.items.len(), 3);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.items[1].outcome, JobOutcome::Failed { code: 1 });
    assert_eq!(logs, [(1, "moov atom not found".to_string())]);
}

#[cfg(unix)]
#[test]
fn test_cancel_stops_the_queue() {
    let dir = TempDir::new().unwrap();
    let encoder = fake_encoder(
        dir.path(),
        "trap 'exit 255' TERM\necho started\nwhile :; do sleep 0.1; done",
    );

    let jobs = vec![
        options("/tmp/a.mkv", "/tmp/a@converted.mp4", "Balanced"),
        options("/tmp/b.mkv", "/tmp/b@converted.mp4", "Balanced"),
        options("/tmp/c.mkv", "/tmp/c@converted.mp4", "Balanced"),
    ];

    let runner = BatchRunner::new(encoder, Capabilities::default());
    let cancel = runner.cancel_handle();
    let summary = runner.run(jobs, |_, event| {
        if matches!(event, JobEvent::Log { line, .. } if line == "started") {
            let cancel = cancel.clone();
            std::thread::spawn(move || cancel.cancel()).join().unwrap();
        }
    });

    assert!(cancel.is_cancelled());
    assert!(summary.was_cancelled());
    assert_eq!(summary.items.len(), 1);
    assert_eq!(summary.items[0].outcome, JobOutcome::Cancelled);
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.succeeded(), 0);
}

#[test]
fn test_empty_batch() {
    let runner = BatchRunner::new("ffmpeg".into(), Capabilities::default());
    let summary = runner.run(Vec::new(), |_, _| {});
    assert!(summary.items.is_empty());
    assert!(!summary.was_cancelled());
}
