//! Core configuration.

use std::time::Duration;

/// Hard wall-clock execution budget per session, measured from start, with
/// no activity-based extension.
pub const DEFAULT_EXECUTION_BUDGET: Duration = Duration::from_secs(30);

/// Maximum size of a submitted source in bytes (1 MiB).
pub const DEFAULT_MAX_SOURCE_BYTES: usize = 1024 * 1024;

/// Bound on the sliding window kept for prompt detection.
pub const DEFAULT_PROMPT_WINDOW: usize = 256;

/// Configuration for the session registry.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Wall-clock budget per session, armed at start.
    pub execution_budget: Duration,
    /// Maximum number of concurrent sessions (0 = unlimited).
    pub max_sessions: usize,
    /// Maximum submitted source size in bytes.
    pub max_source_bytes: usize,
    /// Size of the prompt-detection window in bytes.
    pub prompt_window: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            execution_budget: DEFAULT_EXECUTION_BUDGET,
            max_sessions: 64,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            prompt_window: DEFAULT_PROMPT_WINDOW,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.execution_budget, Duration::from_secs(30));
        assert_eq!(config.max_sessions, 64);
        assert_eq!(config.max_source_bytes, 1024 * 1024);
        assert_eq!(config.prompt_window, 256);
    }
}
