//! Shared subprocess plumbing for sandbox operations.
//!
//! Every external call the pipeline makes (venv creation, runtime
//! verification, package install, tool launch) is a blocking child process
//! bounded by a wall-clock timeout. Output streams are drained on
//! background threads and decoded lossily.

use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

/// Poll interval while waiting on a child process.
const WAIT_POLL_INTERVAL_MS: u64 = 100;

/// Captured outcome of one bounded child process run.
#[derive(Debug)]
pub struct ChildOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
}

impl ChildOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }
}

/// Spawn `cmd` with piped output and wait for it with a timeout.
pub fn run_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<ChildOutput> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn {:?}", cmd.get_program()))?;
    wait_with_timeout(&mut child, timeout_secs)
}

/// Wait for a child process, killing it once `timeout_secs` elapses.
///
/// Reads stdout/stderr in background threads while the process runs.
/// Without this, a child writing more than the pipe buffer (~64KB) would
/// block on write and we'd deadlock waiting for it to exit. Undecodable
/// bytes are replaced, never fatal.
pub fn wait_with_timeout(child: &mut Child, timeout_secs: u64) -> Result<ChildOutput> {
    let start = Instant::now();
    let timeout = Duration::from_secs(timeout_secs);

    let stdout_handle = child.stdout.take().map(spawn_lossy_reader);
    let stderr_handle = child.stderr.take().map(spawn_lossy_reader);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = join_reader(stdout_handle);
                let stderr = join_reader(stderr_handle);
                return Ok(ChildOutput {
                    stdout,
                    stderr,
                    exit_code: status.code().unwrap_or(-1),
                    timed_out: false,
                });
            }
            Ok(None) => {}
            Err(e) => {
                let _ = join_reader(stdout_handle);
                let _ = join_reader(stderr_handle);
                return Err(anyhow::anyhow!("Failed to wait for process: {}", e));
            }
        }

        if start.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            let stdout = join_reader(stdout_handle);
            let stderr = join_reader(stderr_handle);
            return Ok(ChildOutput {
                stdout,
                stderr: format!(
                    "Process killed: exceeded timeout of {} seconds\n{}",
                    timeout_secs, stderr
                ),
                exit_code: -1,
                timed_out: true,
            });
        }

        thread::sleep(Duration::from_millis(WAIT_POLL_INTERVAL_MS));
    }
}

fn spawn_lossy_reader<R: Read + Send + 'static>(mut stream: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut out = String::new();
        let mut buf = [0u8; 4096];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => out.push_str(&String::from_utf8_lossy(&buf[..n])),
                Err(_) => break,
            }
        }
        out
    })
}

fn join_reader(handle: Option<thread::JoinHandle<String>>) -> String {
    handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default()
}
