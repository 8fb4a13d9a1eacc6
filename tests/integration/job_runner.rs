// Job Runner lifecycle against real child processes (`sh -c` scripts)

use crate::common::helpers::*;
use hardsub::engine::{JobEvent, JobOutcome, JobRunner, JobState, RunnerError};
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Consume events until a log line equal to `needle` shows up
fn wait_for_log(rx: &Receiver<JobEvent>, needle: &str) -> Vec<JobEvent> {
    let mut seen = Vec::new();
    loop {
        let event = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("job went quiet before printing the marker");
        let hit = matches!(&event, JobEvent::Log { line, .. } if line == needle);
        assert!(
            !matches!(event, JobEvent::Finished { .. }),
            "job finished before printing {:?}",
            needle
        );
        seen.push(event);
        if hit {
            return seen;
        }
    }
}

#[cfg(unix)]
#[test]
fn test_success_reports_progress_and_logs() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.mp4");
    let script = format!(
        "printf 'Duration: 00:00:10.00, start: 0.000000\\n' >&2; \
         printf 'frame=1 fps=0 time=00:00:05.00 bitrate=1k\\r' >&2; \
         echo done >&2; \
         printf 'abc' > '{}'",
        output.display()
    );
    let (program, args) = sh(&script);

    let (runner, rx) = JobRunner::with_channel();
    runner.start(&program, &args, &output).unwrap();
    let (events, outcome) = collect_events(&rx);
    runner.join();

    assert_eq!(percents(&events), [50, 100]);
    let logs = log_lines(&events);
    assert!(logs.iter().any(|l| l.starts_with("Duration: 00:00:10.00")));
    assert!(logs.iter().any(|l| l == "done"));
    assert!(!logs.iter().any(|l| l.contains("time=")));

    assert_eq!(
        outcome,
        JobOutcome::Succeeded {
            output_path: output,
            size_bytes: Some(3),
        }
    );
    assert_eq!(finished_count(&events), 1);
    assert!(matches!(events.last(), Some(JobEvent::Finished { .. })));
    assert!(events.iter().all(|e| e.job_id() == runner.id()));
    assert_eq!(runner.state(), JobState::Succeeded);
}

#[cfg(unix)]
#[test]
fn test_stdout_and_stderr_keep_their_interleaving() {
    let (program, args) = sh(
        "i=1; while [ $i -le 200 ]; do echo out$i; echo err$i >&2; i=$((i+1)); done",
    );
    let (runner, rx) = JobRunner::with_channel();
    runner.start(&program, &args, Path::new("unused.mp4")).unwrap();
    let (events, outcome) = collect_events(&rx);
    runner.join();

    let expected: Vec<String> = (1..=200)
        .flat_map(|i| [format!("out{}", i), format!("err{}", i)])
        .collect();
    assert!(outcome.is_success());
    assert_eq!(log_lines(&events), expected);
}

#[cfg(unix)]
#[test]
fn test_nonzero_exit_is_failure_with_code() {
    let (program, args) = sh("echo 'Invalid argument' >&2; exit 3");
    let (runner, rx) = JobRunner::with_channel();
    runner.start(&program, &args, Path::new("unused.mp4")).unwrap();

    let (events, outcome) = collect_events(&rx);
    runner.join();

    assert_eq!(outcome, JobOutcome::Failed { code: 3 });
    assert_eq!(outcome.code(), 3);
    assert_eq!(percents(&events), [100]);
    assert_eq!(log_lines(&events), ["Invalid argument"]);
    assert_eq!(runner.state(), JobState::Failed(3));
}

#[cfg(unix)]
#[test]
fn test_cancel_stops_running_encoder() {
    let (program, args) = sh("trap 'exit 137' TERM; echo ready; while :; do sleep 0.1; done");
    let (runner, rx) = JobRunner::with_channel();
    runner.start(&program, &args, Path::new("unused.mp4")).unwrap();

    let mut events = wait_for_log(&rx, "ready");
    runner.cancel();
    assert!(runner.is_cancel_requested());
    let (rest, outcome) = collect_events(&rx);
    events.extend(rest);
    runner.join();

    assert_eq!(outcome, JobOutcome::Cancelled);
    assert_eq!(outcome.code(), -2);
    assert_eq!(finished_count(&events), 1);
    assert!(!percents(&events).contains(&100));
    assert_eq!(runner.state(), JobState::Cancelled);

    // Nothing arrives after the terminal event
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
}

#[cfg(unix)]
#[test]
fn test_cancel_escalates_to_kill_after_grace_period() {
    let (program, args) = sh("trap '' TERM; echo ready; exec sleep 30");
    let (runner, rx) = JobRunner::with_channel();
    runner.start(&program, &args, Path::new("unused.mp4")).unwrap();

    wait_for_log(&rx, "ready");
    let cancelled_at = Instant::now();
    runner.cancel();
    let (events, outcome) = collect_events(&rx);
    let elapsed = cancelled_at.elapsed();
    runner.join();

    assert_eq!(outcome, JobOutcome::Cancelled);
    assert_eq!(finished_count(&events), 1);
    assert!(elapsed >= Duration::from_secs(5), "killed too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(15), "kill took too long: {:?}", elapsed);
}

#[cfg(unix)]
#[test]
fn test_runner_is_single_use() {
    let (program, args) = sh("exit 0");
    let (runner, rx) = JobRunner::with_channel();
    runner.start(&program, &args, Path::new("unused.mp4")).unwrap();

    assert_eq!(
        runner.start(&program, &args, Path::new("unused.mp4")),
        Err(RunnerError::AlreadyStarted(runner.id()))
    );

    let (events, outcome) = collect_events(&rx);
    runner.join();
    assert!(outcome.is_success());
    assert_eq!(finished_count(&events), 1);
}

#[cfg(unix)]
#[test]
fn test_cancel_after_finish_is_noop() {
    let (program, args) = sh("exit 0");
    let (runner, rx) = JobRunner::with_channel();
    runner.start(&program, &args, Path::new("unused.mp4")).unwrap();
    let (_, outcome) = collect_events(&rx);
    runner.join();

    runner.cancel();
    runner.cancel();

    assert!(outcome.is_success());
    assert!(!runner.is_cancel_requested());
    assert_eq!(runner.state(), JobState::Succeeded);
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
}

#[test]
fn test_missing_program_is_launch_failure() {
    let dir = TempDir::new().unwrap();
    let program = dir.path().join("no-such-encoder");
    let (runner, rx) = JobRunner::with_channel();
    runner.start(&program, &[], &dir.path().join("out.mp4")).unwrap();

    let (events, outcome) = collect_events(&rx);
    runner.join();

    assert!(matches!(outcome, JobOutcome::LaunchFailed { .. }));
    assert_eq!(outcome.code(), -1);
    assert_eq!(percents(&events), [100]);
    assert_eq!(finished_count(&events), 1);
    assert_eq!(runner.state(), JobState::LaunchFailed);
}
