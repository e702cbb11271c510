//! Runtime configuration types.

use crate::error::RuntimeError;
use crate::limits::ResourceLimits;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for creating a process runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Interpreter binary invoked on the submitted source (default:
    /// `python3`, resolved via `PATH`).
    pub interpreter: PathBuf,
    /// Directory under which per-run scratch directories are created.
    pub scratch_root: PathBuf,
    /// Resource caps applied to the process.
    pub limits: ResourceLimits,
    /// How long a graceful stop waits before escalating to SIGKILL.
    pub stop_grace: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            interpreter: PathBuf::from("python3"),
            scratch_root: std::env::temp_dir().join("kiln"),
            limits: ResourceLimits::default(),
            stop_grace: Duration::from_secs(2),
        }
    }
}

impl RuntimeConfig {
    /// Create a new config builder.
    pub fn builder() -> RuntimeConfigBuilder {
        RuntimeConfigBuilder::default()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.interpreter.as_os_str().is_empty() {
            return Err(RuntimeError::Config("interpreter is required".into()));
        }
        if self.scratch_root.as_os_str().is_empty() {
            return Err(RuntimeError::Config("scratch_root is required".into()));
        }
        if self.stop_grace.is_zero() {
            return Err(RuntimeError::Config("stop_grace must be > 0".into()));
        }
        Ok(())
    }
}

/// Builder for [`RuntimeConfig`].
#[derive(Debug, Default)]
pub struct RuntimeConfigBuilder {
    config: RuntimeConfig,
}

impl RuntimeConfigBuilder {
    /// Set the interpreter binary.
    pub fn interpreter(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.interpreter = path.into();
        self
    }

    /// Set the scratch root directory.
    pub fn scratch_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.scratch_root = path.into();
        self
    }

    /// Set the resource caps.
    pub fn limits(mut self, limits: ResourceLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Set the graceful-stop grace window.
    pub fn stop_grace(mut self, grace: Duration) -> Self {
        self.config.stop_grace = grace;
        self
    }

    /// Build the configuration, validating all fields.
    pub fn build(self) -> Result<RuntimeConfig, RuntimeError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.interpreter, PathBuf::from("python3"));
        assert_eq!(config.stop_grace, Duration::from_secs(2));
    }

    #[test]
    fn test_builder_rejects_empty_interpreter() {
        let result = RuntimeConfig::builder().interpreter("").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_rejects_zero_grace() {
        let result = RuntimeConfig::builder()
            .stop_grace(Duration::ZERO)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_success() {
        let config = RuntimeConfig::builder()
            .interpreter("/usr/bin/python3")
            .scratch_root("/tmp/kiln-test")
            .stop_grace(Duration::from_millis(500))
            .build()
            .expect("should build successfully");

        assert_eq!(config.interpreter, PathBuf::from("/usr/bin/python3"));
        assert_eq!(config.scratch_root, PathBuf::from("/tmp/kiln-test"));
        assert_eq!(config.stop_grace, Duration::from_millis(500));
    }
}
