//! Running a converter process to completion, timeout or cancellation.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

/// Only the tail of stderr is kept for error messages. Converters can be
/// extremely chatty (progress lines for every chapter).
const MAX_REASON_BYTES: usize = 4096;

/// Captured result of a successful run. Output is diagnostics only: the exit
/// status and the files left behind are the whole contract.
#[derive(Debug)]
pub(crate) struct Finished {
    pub(crate) stdout: String,
    pub(crate) stderr: String,
    pub(crate) elapsed: Duration,
}

/// Spawn `cmd`, wait for it, and translate the outcome.
///
/// The child runs in its own process group. The whole group is killed if
/// `timeout` elapses, if `cancel` fires, or if this future is dropped, so no
/// converter (or helper it started, like `AAXtoMP3`'s `ffmpeg`) outlives the
/// request that started it.
pub(crate) async fn run(mut cmd: Command, timeout: Duration, cancel: &CancellationToken) -> Result<Finished> {
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);
    let start = Instant::now();
    let mut child = cmd.spawn().or_raise(|| ErrorKind::Spawn)?;
    let mut group = ProcessGroup(child.id());

    // Drain both pipes concurrently so a full pipe buffer can't stall the
    // child while we're waiting on it.
    let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
    let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

    let status: ExitStatus = tokio::select! {
        waited = tokio::time::timeout(timeout, child.wait()) => match waited {
            Ok(status) => status.or_raise(|| ErrorKind::Io)?,
            Err(_elapsed) => {
                tracing::warn!(timeout = timeout.as_secs(), "Converter timed out; killing it");
                group.kill(&mut child).await;
                exn::bail!(ErrorKind::Timeout(timeout));
            },
        },
        _ = cancel.cancelled() => {
            tracing::info!("Conversion cancelled; killing converter");
            group.kill(&mut child).await;
            exn::bail!(ErrorKind::Cancelled);
        },
    };
    // The leader is reaped; its id may be reused from here on.
    group.0 = None;

    let stdout = String::from_utf8_lossy(&stdout_task.await.unwrap_or_default()).into_owned();
    let stderr = String::from_utf8_lossy(&stderr_task.await.unwrap_or_default()).into_owned();
    let elapsed = start.elapsed();
    if !status.success() {
        tracing::debug!(stdout = %stdout, "Converter stdout");
        exn::bail!(ErrorKind::Failed {
            code: status.code(),
            reason: tail(&stderr, MAX_REASON_BYTES).trim().to_string(),
        });
    }
    Ok(Finished { stdout, stderr, elapsed })
}

/// Process group led by a spawned converter, killed when dropped unless the
/// leader exited on its own.
struct ProcessGroup(Option<u32>);

impl ProcessGroup {
    async fn kill(&mut self, child: &mut Child) {
        self.signal();
        _ = child.kill().await;
    }

    #[cfg(unix)]
    fn signal(&mut self) {
        let Some(pgid) = self.0.take().and_then(|id| libc::pid_t::try_from(id).ok()) else {
            return;
        };
        // SAFETY: killpg has no memory-safety preconditions; the group was
        // created by `process_group(0)` and its leader has not been reaped.
        if unsafe { libc::killpg(pgid, libc::SIGKILL) } != 0 {
            tracing::debug!(pgid, error = %std::io::Error::last_os_error(), "Unable to signal converter process group");
        }
    }

    #[cfg(not(unix))]
    fn signal(&mut self) {
        self.0 = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.signal();
    }
}

async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        _ = h.read_to_end(&mut buf).await;
    }
    buf
}

/// The last `max` bytes of `s`, cut on a character boundary.
fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
