//! Configuration for the gateway.
//!
//! Configuration is loaded from environment variables with sensible
//! defaults.

use kiln_core::CoreConfig;
use kiln_runtime::RuntimeConfig;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the kiln server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server bind address.
    pub http_addr: SocketAddr,

    /// Interpreter binary for submitted code.
    pub interpreter: PathBuf,

    /// Directory for per-run scratch directories.
    pub scratch_root: PathBuf,

    /// Wall-clock execution budget per session.
    pub execution_budget: Duration,

    /// Maximum concurrent sessions (0 = unlimited).
    pub max_sessions: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 4000),
            interpreter: PathBuf::from("python3"),
            scratch_root: std::env::temp_dir().join("kiln"),
            execution_budget: Duration::from_secs(30),
            max_sessions: 64,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `KILN_HTTP_HOST` | `0.0.0.0` |
    /// | `KILN_HTTP_PORT` | `4000` |
    /// | `KILN_INTERPRETER` | `python3` |
    /// | `KILN_SCRATCH` | `<tmp>/kiln` |
    /// | `KILN_BUDGET_SECS` | `30` |
    /// | `KILN_MAX_SESSIONS` | `64` |
    pub fn from_env() -> Self {
        let default = Self::default();

        let http_host: IpAddr = std::env::var("KILN_HTTP_HOST")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let http_port: u16 = std::env::var("KILN_HTTP_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(4000);

        Self {
            http_addr: SocketAddr::new(http_host, http_port),
            interpreter: std::env::var("KILN_INTERPRETER")
                .map(PathBuf::from)
                .unwrap_or(default.interpreter),
            scratch_root: std::env::var("KILN_SCRATCH")
                .map(PathBuf::from)
                .unwrap_or(default.scratch_root),
            execution_budget: std::env::var("KILN_BUDGET_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.execution_budget),
            max_sessions: std::env::var("KILN_MAX_SESSIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_sessions),
        }
    }

    /// Warn about configuration problems without failing startup.
    pub fn validate_warn(&self) {
        if self.interpreter.is_absolute() && !self.interpreter.exists() {
            tracing::warn!("Interpreter not found: {:?}", self.interpreter);
        }
        if self.execution_budget.is_zero() {
            tracing::warn!("Execution budget is zero; every run will time out immediately");
        }
    }

    /// Core configuration derived from this server config.
    pub fn core_config(&self) -> CoreConfig {
        CoreConfig {
            execution_budget: self.execution_budget,
            max_sessions: self.max_sessions,
            ..CoreConfig::default()
        }
    }

    /// Runtime configuration derived from this server config.
    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            interpreter: self.interpreter.clone(),
            scratch_root: self.scratch_root.clone(),
            ..RuntimeConfig::default()
        }
    }
}
