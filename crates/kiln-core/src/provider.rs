//! Sandbox provider boundary.
//!
//! The registry consumes sandboxes through these traits and never sees how
//! they are made. [`ProcessProvider`] is the shipped implementation, backed
//! by `kiln-runtime`; tests inject their own fakes.
//!
//! Resource caps (bounded memory, CPU, process count) are the provider's
//! responsibility; the core does not re-validate them.

use crate::error::{CoreError, Result};
use async_trait::async_trait;
use kiln_runtime::{ProcessRuntime, RuntimeConfig};
use tokio::io::{AsyncRead, AsyncWrite};

/// Raw stream handles of a started sandbox.
///
/// `combined` carries interleaved, framed output and error bytes (the
/// `kiln_runtime::frame` format); the demultiplexer splits it.
pub struct RawIo {
    /// Write end of the sandbox's stdin.
    pub input: Box<dyn AsyncWrite + Send + Unpin>,
    /// Read end of the combined framed output channel.
    pub combined: Box<dyn AsyncRead + Send + Unpin>,
}

/// Materializes isolated runtimes for submitted source code.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Create a sandbox holding the given source, ready to start.
    async fn provision(&self, source: &str) -> Result<Box<dyn SandboxInstance>>;
}

/// One isolated, resource-capped runtime instance.
///
/// `stop` and `destroy` are idempotent; calling either on a dead instance
/// is a no-op.
#[async_trait]
pub trait SandboxInstance: Send {
    /// Start execution and hand out the raw stream handles.
    async fn start(&mut self) -> Result<RawIo>;

    /// Graceful stop (bounded internally; escalates on its own).
    async fn stop(&mut self) -> Result<()>;

    /// Forced, immediate teardown.
    async fn destroy(&mut self) -> Result<()>;

    /// Whether the underlying runtime is still alive.
    async fn is_running(&mut self) -> bool;

    /// Delete the temporary on-disk artifact created for this run.
    async fn remove_artifact(&mut self) -> Result<()>;
}

/// Production provider: one resource-limited interpreter process per
/// submission.
pub struct ProcessProvider {
    config: RuntimeConfig,
}

impl ProcessProvider {
    /// Create a provider that provisions processes with the given config.
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SandboxProvider for ProcessProvider {
    async fn provision(&self, source: &str) -> Result<Box<dyn SandboxInstance>> {
        let runtime = ProcessRuntime::provision(source, self.config.clone())
            .await
            .map_err(|e| CoreError::Provision(e.to_string()))?;
        Ok(Box::new(ProcessInstance { runtime }))
    }
}

struct ProcessInstance {
    runtime: ProcessRuntime,
}

#[async_trait]
impl SandboxInstance for ProcessInstance {
    async fn start(&mut self) -> Result<RawIo> {
        let io = self
            .runtime
            .start()
            .map_err(|e| CoreError::Start(e.to_string()))?;
        Ok(RawIo {
            input: Box::new(io.input),
            combined: Box::new(io.combined),
        })
    }

    async fn stop(&mut self) -> Result<()> {
        self.runtime
            .stop()
            .await
            .map_err(|e| CoreError::Stream(e.to_string()))
    }

    async fn destroy(&mut self) -> Result<()> {
        self.runtime
            .kill()
            .await
            .map_err(|e| CoreError::Stream(e.to_string()))
    }

    async fn is_running(&mut self) -> bool {
        self.runtime.is_running()
    }

    async fn remove_artifact(&mut self) -> Result<()> {
        self.runtime
            .remove_artifact()
            .await
            .map_err(|e| CoreError::Stream(e.to_string()))
    }
}
