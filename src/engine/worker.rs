// Job runner: owns one encoder subprocess and reports its progress

use std::io::{self, PipeReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::core::{
    ConversionOptions, JobEvent, JobOutcome, JobState, OutputLines, ProgressParser,
    build_encode_cmd, exit_code, is_progress_line, request_terminate,
};
use super::hardware::Capabilities;

/// How long a cancelled encoder may take to exit before it is killed
pub const CANCEL_GRACE: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Output still in the pipe after exit; bounded in case a grandchild keeps them open
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunnerError {
    #[error("job {0} was already started")]
    AlreadyStarted(Uuid),
    #[error("job {0} was cancelled before it started")]
    CancelledBeforeStart(Uuid),
}

struct Inner {
    state: JobState,
    child: Option<Child>,
    cancel_requested_at: Option<Instant>,
    started: bool,
    killed: bool,
}

struct Shared {
    id: Uuid,
    inner: Mutex<Inner>,
    events: Sender<JobEvent>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn send(&self, event: JobEvent) {
        // Receiver gone means nobody is listening; the job still runs to completion
        let _ = self.events.send(event);
    }

    fn progress(&self, percent: u8) {
        self.send(JobEvent::Progress {
            job_id: self.id,
            percent,
        });
    }

    fn log(&self, line: impl Into<String>) {
        self.send(JobEvent::Log {
            job_id: self.id,
            line: line.into(),
        });
    }

    fn finish(&self, outcome: JobOutcome) {
        info!(job_id = %self.id, "Job finished: {}", outcome);
        self.send(JobEvent::Finished {
            job_id: self.id,
            outcome,
        });
    }
}

/// Runs a single encode. States move `Idle -> Running -> terminal` once;
/// a new job needs a new runner.
///
/// Events arrive on the channel given to [`JobRunner::new`]: progress and log
/// lines in output order, then exactly one `Finished`. Clones share the same
/// job, so one can be handed to another thread for cancellation.
#[derive(Clone)]
pub struct JobRunner {
    shared: Arc<Shared>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl JobRunner {
    pub fn new(events: Sender<JobEvent>) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: Uuid::new_v4(),
                inner: Mutex::new(Inner {
                    state: JobState::Idle,
                    child: None,
                    cancel_requested_at: None,
                    started: false,
                    killed: false,
                }),
                events,
            }),
            worker: Arc::new(Mutex::new(None)),
        }
    }

    /// Runner plus the receiving end of its event channel
    pub fn with_channel() -> (Self, Receiver<JobEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self::new(tx), rx)
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn state(&self) -> JobState {
        self.shared.lock().state.clone()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.shared.lock().cancel_requested_at.is_some()
    }

    /// Launch `program args...` and supervise it on a background thread.
    ///
    /// A spawn failure is not an error here: it is reported as a
    /// `LaunchFailed` outcome on the event channel.
    pub fn start(&self, program: &Path, args: &[String], output_path: &Path) -> Result<(), RunnerError> {
        let mut inner = self.shared.lock();
        match inner.state {
            JobState::Idle => {}
            JobState::Cancelled if !inner.started => {
                return Err(RunnerError::CancelledBeforeStart(self.shared.id));
            }
            _ => return Err(RunnerError::AlreadyStarted(self.shared.id)),
        }
        inner.started = true;

        let spawned = spawn_merged(program, args);

        let (child, output) = match spawned {
            Ok(spawned) => spawned,
            Err(e) => {
                let reason = format!("{}: {}", program.display(), e);
                warn!(job_id = %self.shared.id, "Failed to launch encoder: {}", reason);
                inner.state = JobState::LaunchFailed;
                drop(inner);

                self.shared.log(format!("Failed to start encoder: {}", reason));
                self.shared.progress(100);
                self.shared.finish(JobOutcome::LaunchFailed { reason });
                return Ok(());
            }
        };

        info!(job_id = %self.shared.id, pid = child.id(), "Encoder started");
        let lines = spawn_line_reader(output);
        inner.child = Some(child);
        inner.state = JobState::Running;
        drop(inner);

        let shared = Arc::clone(&self.shared);
        let output_path = output_path.to_path_buf();
        let handle = thread::spawn(move || supervise(shared, lines, output_path));
        *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        Ok(())
    }

    /// Request cancellation. The encoder is asked to stop and is killed if it
    /// is still alive after [`CANCEL_GRACE`]. Never blocks on the process.
    ///
    /// Idempotent, and a no-op once the job has finished. Cancelling an idle
    /// runner finishes it as `Cancelled` immediately.
    pub fn cancel(&self) {
        let mut inner = self.shared.lock();
        if inner.state.is_terminal() || inner.cancel_requested_at.is_some() {
            return;
        }
        inner.cancel_requested_at = Some(Instant::now());

        if inner.state == JobState::Idle {
            inner.state = JobState::Cancelled;
            drop(inner);
            self.shared.finish(JobOutcome::Cancelled);
            return;
        }

        info!(job_id = %self.shared.id, "Cancelling job");
        let mut force_killed = false;
        if let Some(child) = inner.child.as_mut() {
            if matches!(child.try_wait(), Ok(None)) && !request_terminate(child.id()) {
                // No graceful stop available; go straight to kill
                force_killed = child.kill().is_ok();
            }
        }
        inner.killed |= force_killed;
    }

    /// Block until the supervising thread is done (all events sent)
    pub fn join(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}

/// Spawn with stdout and stderr sharing one pipe, so lines arrive in the
/// order the encoder wrote them
fn spawn_merged(program: &Path, args: &[String]) -> io::Result<(Child, PipeReader)> {
    let (reader, writer) = io::pipe()?;

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(writer.try_clone()?)
        .stderr(writer);
    #[cfg(unix)]
    {
        // Own process group: a terminal Ctrl+C reaches us, not the encoder
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let child = command.spawn()?;

    // Our copies of the write end must close, or the reader never sees EOF
    drop(command);
    Ok((child, reader))
}

fn spawn_line_reader(pipe: PipeReader) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in OutputLines::new(pipe) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn handle_line(shared: &Shared, parser: &mut ProgressParser, line: &str) {
    if let Some(percent) = parser.parse_line(line) {
        shared.progress(percent);
    }
    if !is_progress_line(line) {
        let line = line.trim();
        if !line.is_empty() {
            shared.log(line);
        }
    }
}

/// Non-blocking exit check, escalating to kill once the cancel grace period ran out
fn poll_exit(shared: &Shared) -> io::Result<Option<ExitStatus>> {
    let mut inner = shared.lock();
    let overdue = inner
        .cancel_requested_at
        .is_some_and(|at| at.elapsed() >= CANCEL_GRACE);
    let killed = inner.killed;

    let Some(child) = inner.child.as_mut() else {
        return Err(io::Error::other("encoder process handle missing"));
    };
    if let Some(status) = child.try_wait()? {
        return Ok(Some(status));
    }
    if overdue && !killed {
        warn!(job_id = %shared.id, "Encoder ignored termination request, killing it");
        child.kill()?;
        inner.killed = true;
    }
    Ok(None)
}

fn wait_for_exit(shared: &Shared) -> io::Result<ExitStatus> {
    loop {
        if let Some(status) = poll_exit(shared)? {
            return Ok(status);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn supervise(shared: Arc<Shared>, lines: Receiver<String>, output_path: PathBuf) {
    let mut parser = ProgressParser::new();
    let mut exited: Option<io::Result<ExitStatus>> = None;

    loop {
        match lines.recv_timeout(POLL_INTERVAL) {
            Ok(line) => handle_line(&shared, &mut parser, &line),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        match poll_exit(&shared) {
            Ok(None) => {}
            Ok(Some(status)) => {
                exited = Some(Ok(status));
                break;
            }
            Err(e) => {
                exited = Some(Err(e));
                break;
            }
        }
    }

    while let Ok(line) = lines.recv_timeout(DRAIN_TIMEOUT) {
        handle_line(&shared, &mut parser, &line);
    }

    let status = exited.unwrap_or_else(|| wait_for_exit(&shared));

    let outcome = {
        let mut inner = shared.lock();
        let cancelled = inner.cancel_requested_at.is_some();
        inner.child = None;

        let outcome = match status {
            _ if cancelled => JobOutcome::Cancelled,
            Ok(status) if status.success() => JobOutcome::Succeeded {
                size_bytes: std::fs::metadata(&output_path).ok().map(|m| m.len()),
                output_path,
            },
            Ok(status) => JobOutcome::Failed {
                code: exit_code(&status),
            },
            Err(e) => {
                warn!(job_id = %shared.id, "Lost track of encoder process: {}", e);
                JobOutcome::Failed { code: -1 }
            }
        };
        inner.state = outcome.state();
        outcome
    };

    if !matches!(outcome, JobOutcome::Cancelled) {
        shared.progress(100);
    }
    debug!(job_id = %shared.id, duration_s = ?parser.duration_s(), "Supervisor done");
    shared.finish(outcome);
}

// ============================================================================
// Batch queue
// ============================================================================

/// One finished entry of a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub input_path: PathBuf,
    pub outcome: JobOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub items: Vec<BatchItem>,
    /// Jobs never started because the batch was cancelled
    pub skipped: usize,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i.outcome, JobOutcome::Failed { .. } | JobOutcome::LaunchFailed { .. }))
            .count()
    }

    pub fn was_cancelled(&self) -> bool {
        self.skipped > 0
            || self
                .items
                .iter()
                .any(|i| matches!(i.outcome, JobOutcome::Cancelled))
    }
}

/// Cancels the running job of a batch and everything queued after it
#[derive(Clone)]
pub struct BatchCancel {
    cancelled: Arc<AtomicBool>,
    current: Arc<Mutex<Option<JobRunner>>>,
}

impl BatchCancel {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(runner) = current.as_ref() {
            runner.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Sequential queue: one job at a time, each with its own [`JobRunner`]
pub struct BatchRunner {
    program: PathBuf,
    caps: Capabilities,
    cancel: BatchCancel,
}

impl BatchRunner {
    pub fn new(program: PathBuf, caps: Capabilities) -> Self {
        Self {
            program,
            caps,
            cancel: BatchCancel {
                cancelled: Arc::new(AtomicBool::new(false)),
                current: Arc::new(Mutex::new(None)),
            },
        }
    }

    pub fn cancel_handle(&self) -> BatchCancel {
        self.cancel.clone()
    }

    /// Run every job in order. `on_event` sees each job's events with the
    /// job's queue position. A cancelled job stops the rest of the queue.
    pub fn run<F>(&self, jobs: Vec<ConversionOptions>, mut on_event: F) -> BatchSummary
    where
        F: FnMut(usize, &JobEvent),
    {
        let total = jobs.len();
        let mut summary = BatchSummary::default();

        for (position, opts) in jobs.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                summary.skipped = total - position;
                break;
            }

            let command = build_encode_cmd(&self.caps, &opts);
            let (runner, events) = JobRunner::with_channel();
            *self.cancel.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(runner.clone());
            info!(
                "[{}/{}] {} ({})",
                position + 1,
                total,
                opts.input_path.display(),
                command.encoder_label()
            );

            if self.cancel.is_cancelled() {
                runner.cancel();
            }
            if let Err(e) = runner.start(&self.program, &command.args, &opts.output_path) {
                debug!("Batch job not started: {}", e);
            }

            let outcome = wait_for_outcome(&events, |event| on_event(position, event));
            runner.join();
            *self.cancel.current.lock().unwrap_or_else(PoisonError::into_inner) = None;

            let stop = matches!(outcome, JobOutcome::Cancelled);
            summary.items.push(BatchItem {
                input_path: opts.input_path,
                outcome,
            });
            if stop {
                summary.skipped = total - position - 1;
                break;
            }
        }

        summary
    }
}

/// Forward events until the terminal one and return its outcome
pub fn wait_for_outcome<F>(events: &Receiver<JobEvent>, mut on_event: F) -> JobOutcome
where
    F: FnMut(&JobEvent),
{
    for event in events.iter() {
        on_event(&event);
        if let JobEvent::Finished { outcome, .. } = event {
            return outcome;
        }
    }
    JobOutcome::LaunchFailed {
        reason: "job runner stopped without reporting an outcome".to_string(),
    }
}
