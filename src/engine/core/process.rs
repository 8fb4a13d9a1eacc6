use std::io;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Wait for a child to exit, giving up after `timeout`.
/// Returns `Ok(None)` if the child is still running when the deadline passes.
pub fn wait_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Ask a process to exit (SIGTERM on Unix). ffmpeg traps the signal, finalizes
/// the container and exits on its own.
#[cfg(unix)]
pub fn request_terminate(pid: u32) -> bool {
    // SAFETY: kill(2) has no memory-safety preconditions; a stale pid only yields ESRCH.
    unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 }
}

/// No graceful signal on this platform; callers fall back to `Child::kill`.
#[cfg(not(unix))]
pub fn request_terminate(_pid: u32) -> bool {
    false
}

/// Exit code as an integer. Signal deaths map to the shell convention `128 + signo`.
pub fn exit_code(status: &ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}
