//! ProcessRuntime - an ephemeral interpreter process over one submitted
//! source file.

use crate::config::RuntimeConfig;
use crate::error::{Result, RuntimeError};
use crate::frame::{self, StreamTag};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use uuid::Uuid;

/// Buffer size of the combined output channel.
const COMBINED_BUFFER: usize = 64 * 1024;

/// Read buffer size for each of the child's pipes.
const PIPE_READ_BUF: usize = 4 * 1024;

/// Name of the single writable artifact inside the scratch directory.
const SOURCE_FILE: &str = "main.py";

/// Current state of the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    /// Source written, process not yet spawned.
    Provisioned,
    /// Interpreter process is running.
    Running,
    /// Process has exited or been killed.
    Stopped,
}

impl std::fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeState::Provisioned => write!(f, "provisioned"),
            RuntimeState::Running => write!(f, "running"),
            RuntimeState::Stopped => write!(f, "stopped"),
        }
    }
}

/// I/O handles obtained from a started runtime.
///
/// `combined` interleaves framed stdout/stderr (see [`crate::frame`]); it
/// ends when the process has exited and both pipes are drained.
pub struct RuntimeIo {
    /// Write end of the process's stdin.
    pub input: ChildStdin,
    /// Read end of the combined, framed output channel.
    pub combined: DuplexStream,
}

/// An isolated, resource-capped interpreter process for one submission.
///
/// The submitted source is the only writable artifact; it lives in a private
/// per-run scratch directory that doubles as the process's working
/// directory. The process runs with a cleared environment, in its own
/// process group so signals reach any children it spawns.
pub struct ProcessRuntime {
    id: Uuid,
    config: RuntimeConfig,
    scratch: PathBuf,
    child: Option<Child>,
    state: RuntimeState,
}

impl ProcessRuntime {
    /// Write the submitted source into a fresh scratch directory.
    ///
    /// No process is spawned yet; call [`start`](Self::start) next.
    pub async fn provision(source: &str, config: RuntimeConfig) -> Result<Self> {
        config.validate()?;

        let id = Uuid::new_v4();
        let scratch = config.scratch_root.join(format!("run-{id}"));
        tokio::fs::create_dir_all(&scratch).await?;

        let source_path = scratch.join(SOURCE_FILE);
        if let Err(e) = tokio::fs::write(&source_path, source).await {
            // Don't leave an empty scratch dir behind on failure.
            let _ = tokio::fs::remove_dir_all(&scratch).await;
            return Err(e.into());
        }

        tracing::debug!(
            runtime_id = %id,
            path = %source_path.display(),
            source_bytes = source.len(),
            "Source provisioned"
        );

        Ok(Self {
            id,
            config,
            scratch,
            child: None,
            state: RuntimeState::Provisioned,
        })
    }

    /// Get the runtime ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the current state.
    pub fn state(&self) -> RuntimeState {
        self.state
    }

    /// Path of the per-run scratch directory.
    pub fn artifact_path(&self) -> &Path {
        &self.scratch
    }

    /// Spawn the interpreter and return its I/O handles.
    ///
    /// The child gets piped stdio, a cleared environment, its own process
    /// group, and the configured rlimits applied between fork and exec.
    pub fn start(&mut self) -> Result<RuntimeIo> {
        if self.state != RuntimeState::Provisioned {
            return Err(RuntimeError::InvalidState {
                expected: "provisioned".into(),
                actual: self.state.to_string(),
            });
        }

        let source_path = self.scratch.join(SOURCE_FILE);
        let mut cmd = Command::new(&self.config.interpreter);
        cmd.arg(&source_path)
            .current_dir(&self.scratch)
            .env_clear()
            .env("PATH", "/usr/local/bin:/usr/bin:/bin")
            // Interactive prompts must reach the client without sitting in
            // a block buffer.
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let limits = self.config.limits;
        unsafe {
            cmd.pre_exec(move || limits.apply());
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| RuntimeError::Spawn(format!("{}: {e}", self.config.interpreter.display())))?;

        let (input, stdout, stderr) = match (child.stdin.take(), child.stdout.take(), child.stderr.take()) {
            (Some(i), Some(o), Some(e)) => (i, o, e),
            _ => {
                return Err(RuntimeError::Spawn("child stdio handles missing".into()));
            }
        };

        let (mux_end, combined) = tokio::io::duplex(COMBINED_BUFFER);
        tokio::spawn(mux_streams(self.id, stdout, stderr, mux_end));

        tracing::info!(
            runtime_id = %self.id,
            interpreter = %self.config.interpreter.display(),
            pid = child.id().unwrap_or(0),
            "Interpreter started"
        );

        self.child = Some(child);
        self.state = RuntimeState::Running;

        Ok(RuntimeIo { input, combined })
    }

    /// Whether the process is still alive.
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Stop the process gracefully: SIGTERM to the process group, then
    /// escalate to SIGKILL if the grace window elapses. Idempotent.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        if child.try_wait()?.is_some() {
            self.state = RuntimeState::Stopped;
            return Ok(());
        }

        tracing::debug!(runtime_id = %self.id, "Stopping process");
        if let Some(pid) = child.id() {
            signal_group(pid, libc::SIGTERM);
        }

        match tokio::time::timeout(self.config.stop_grace, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!(runtime_id = %self.id, ?status, "Process exited");
                self.state = RuntimeState::Stopped;
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                tracing::warn!(
                    runtime_id = %self.id,
                    grace_ms = self.config.stop_grace.as_millis() as u64,
                    "Grace window elapsed, escalating to SIGKILL"
                );
                self.kill().await
            }
        }
    }

    /// Kill the process immediately with SIGKILL. Idempotent.
    pub async fn kill(&mut self) -> Result<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        if child.try_wait()?.is_none() {
            tracing::debug!(runtime_id = %self.id, "Killing process group");
            if let Some(pid) = child.id() {
                signal_group(pid, libc::SIGKILL);
            }
            let _ = child.kill().await;
        }
        let _ = child.wait().await;
        self.state = RuntimeState::Stopped;
        Ok(())
    }

    /// Delete the scratch directory and the submitted source in it.
    pub async fn remove_artifact(&mut self) -> Result<()> {
        tracing::debug!(runtime_id = %self.id, path = %self.scratch.display(), "Removing scratch directory");
        tokio::fs::remove_dir_all(&self.scratch).await?;
        Ok(())
    }
}

/// Send a signal to the child's whole process group.
///
/// Negative pid targets the group created via `process_group(0)` at spawn,
/// so children of the interpreter are covered too.
fn signal_group(pid: u32, signal: i32) {
    let rc = unsafe { libc::kill(-(pid as i32), signal) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH means the group is already gone.
        if err.raw_os_error() != Some(libc::ESRCH) {
            tracing::debug!(pid, signal, error = %err, "Signal delivery failed");
        }
    }
}

/// Interleave the child's stdout and stderr into the combined channel as
/// framed chunks. Ends (closing the channel) once both pipes hit EOF.
async fn mux_streams(
    id: Uuid,
    mut stdout: ChildStdout,
    mut stderr: ChildStderr,
    mut sink: DuplexStream,
) {
    let mut out_buf = [0u8; PIPE_READ_BUF];
    let mut err_buf = [0u8; PIPE_READ_BUF];
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        tokio::select! {
            read = stdout.read(&mut out_buf), if out_open => match read {
                Ok(0) => out_open = false,
                Ok(n) => {
                    if sink.write_all(&frame::encode(StreamTag::Stdout, &out_buf[..n])).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(runtime_id = %id, error = %e, "stdout read failed");
                    out_open = false;
                }
            },
            read = stderr.read(&mut err_buf), if err_open => match read {
                Ok(0) => err_open = false,
                Ok(n) => {
                    if sink.write_all(&frame::encode(StreamTag::Stderr, &err_buf[..n])).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::debug!(runtime_id = %id, error = %e, "stderr read failed");
                    err_open = false;
                }
            },
        }
    }

    tracing::trace!(runtime_id = %id, "Output streams drained");
    // Dropping the sink closes the combined channel for the reader.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_state_display() {
        assert_eq!(format!("{}", RuntimeState::Provisioned), "provisioned");
        assert_eq!(format!("{}", RuntimeState::Running), "running");
        assert_eq!(format!("{}", RuntimeState::Stopped), "stopped");
    }

    #[tokio::test]
    async fn test_provision_writes_source() {
        let root = tempfile::tempdir().unwrap();
        let config = RuntimeConfig::builder()
            .scratch_root(root.path())
            .build()
            .unwrap();

        let runtime = ProcessRuntime::provision("print('hi')", config).await.unwrap();
        assert_eq!(runtime.state(), RuntimeState::Provisioned);

        let source = runtime.artifact_path().join(SOURCE_FILE);
        let written = tokio::fs::read_to_string(&source).await.unwrap();
        assert_eq!(written, "print('hi')");
    }

    #[tokio::test]
    async fn test_remove_artifact_deletes_scratch() {
        let root = tempfile::tempdir().unwrap();
        let config = RuntimeConfig::builder()
            .scratch_root(root.path())
            .build()
            .unwrap();

        let mut runtime = ProcessRuntime::provision("print('hi')", config).await.unwrap();
        let scratch = runtime.artifact_path().to_path_buf();
        assert!(scratch.exists());

        runtime.remove_artifact().await.unwrap();
        assert!(!scratch.exists());
    }

    #[tokio::test]
    async fn test_start_requires_provisioned() {
        let root = tempfile::tempdir().unwrap();
        let config = RuntimeConfig::builder()
            .interpreter("/bin/sh")
            .scratch_root(root.path())
            .build()
            .unwrap();

        let mut runtime = ProcessRuntime::provision("exit 0", config).await.unwrap();
        let _io = runtime.start().unwrap();
        // A second start is an invalid-state error, not a second process.
        assert!(matches!(
            runtime.start(),
            Err(RuntimeError::InvalidState { .. })
        ));
        runtime.kill().await.unwrap();
        runtime.remove_artifact().await.unwrap();
    }
}
