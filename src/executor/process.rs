//! Subprocess execution with captured output and process-group cancellation
//!
//! Every child runs as the leader of its own process group. Cancellation and
//! completion both end with the whole group being killed, so commands that
//! background helpers do not leave orphans behind or hold our pipes open.

use nix::fcntl::OFlag;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::{pipe2, Pid};
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::os::fd::OwnedFd;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use crate::error::{BtError, Result};

/// How often a running child is checked for exit and cancellation
const WAIT_SLICE: Duration = Duration::from_millis(50);

/// Timeout for collecting output from child process pipes after exit
const OUTPUT_COLLECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// How a child's output streams are captured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// stdout and stderr share one pipe; interleaving is preserved byte for byte
    Combined,
    /// stdout and stderr are captured separately
    Separate,
}

#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    /// Combined output in `Capture::Combined` mode
    pub stdout: Vec<u8>,
    /// Always empty in `Capture::Combined` mode
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// Exit code 0; death by signal counts as failure
    pub fn success(&self) -> bool {
        self.status.code() == Some(0)
    }
}

/// Output of one stream, filled by a background thread as it arrives
struct OutputReader {
    buf: Arc<Mutex<Vec<u8>>>,
    done: mpsc::Receiver<()>,
}

impl OutputReader {
    fn spawn<R: Read + Send + 'static>(mut stream: R) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let (tx, done) = mpsc::channel();
        thread::spawn(move || {
            let mut chunk = [0u8; 8192];
            loop {
                match stream.read(&mut chunk) {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Ok(mut buf) = sink.lock() {
                            buf.extend_from_slice(&chunk[..n]);
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        debug!(error = %e, "error reading child output");
                        break;
                    }
                }
            }
            let _ = tx.send(());
        });
        Self { buf, done }
    }

    /// Wait up to `timeout` for EOF. Whatever was read by then is returned.
    fn collect(self, timeout: Duration) -> Vec<u8> {
        if self.done.recv_timeout(timeout).is_err() {
            warn!("timed out collecting child output; keeping what was read");
        }
        self.buf
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }
}

fn collect(reader: Option<OutputReader>) -> Vec<u8> {
    reader
        .map(|r| r.collect(OUTPUT_COLLECTION_TIMEOUT))
        .unwrap_or_default()
}

/// Pipe whose ends are closed on exec, so stages spawned concurrently from
/// other threads never inherit this child's write end
fn output_pipe() -> Result<(OwnedFd, OwnedFd)> {
    Ok(pipe2(OFlag::O_CLOEXEC).map_err(std::io::Error::from)?)
}

/// Kill every process in the child's group. ESRCH (already gone) is fine.
fn kill_group(child: &Child) {
    let Ok(pgid) = i32::try_from(child.id()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        if e != nix::errno::Errno::ESRCH {
            warn!(pgid, error = %e, "failed to kill process group");
        }
    }
}

/// Spawn `cmd`, wait for it to exit and return its captured output.
///
/// Returns `BtError::Cancelled` (named by `label`) if `cancel` is raised
/// before the child exits; the child's process group is killed first.
pub fn run_captured(
    mut cmd: Command,
    capture: Capture,
    cancel: &AtomicBool,
    label: &str,
) -> Result<ProcessOutput> {
    cmd.stdin(Stdio::null()).process_group(0);

    let (mut child, stdout_rx, stderr_rx) = match capture {
        Capture::Combined => {
            let (reader, writer) = output_pipe()?;
            cmd.stdout(Stdio::from(writer.try_clone()?))
                .stderr(Stdio::from(writer));
            let child = cmd.spawn()?;
            // Close our copies of the write end so the reader sees EOF
            drop(cmd);
            let rx = OutputReader::spawn(File::from(reader));
            (child, Some(rx), None)
        }
        Capture::Separate => {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
            let mut child = cmd.spawn()?;
            let stdout_rx = child.stdout.take().map(OutputReader::spawn);
            let stderr_rx = child.stderr.take().map(OutputReader::spawn);
            (child, stdout_rx, stderr_rx)
        }
    };
    debug!(pid = child.id(), label, "spawned child");

    let status = loop {
        if cancel.load(Ordering::SeqCst) {
            kill_group(&child);
            let _ = child.wait();
            debug!(label, "child cancelled");
            return Err(BtError::Cancelled(label.to_string()));
        }
        if let Some(status) = child.wait_timeout(WAIT_SLICE)? {
            break status;
        }
    };

    kill_group(&child);

    Ok(ProcessOutput {
        status,
        stdout: collect(stdout_rx),
        stderr: collect(stderr_rx),
    })
}
