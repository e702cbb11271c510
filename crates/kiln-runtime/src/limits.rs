//! Resource caps applied to the sandboxed process.

use rlimit::Resource;

/// Resource limits enforced on a sandboxed process before exec.
///
/// These map onto POSIX rlimits and are applied in the child between fork
/// and exec, so the interpreter never runs uncapped.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    /// Address space cap in bytes (default: 256 MiB).
    pub memory_bytes: u64,
    /// CPU time cap in seconds (default: 30).
    pub cpu_secs: u64,
    /// Maximum number of processes/threads (default: 256).
    pub max_processes: u64,
    /// Maximum size of any file the process may create, in bytes
    /// (default: 8 MiB).
    pub max_file_bytes: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            memory_bytes: 256 * 1024 * 1024,
            cpu_secs: 30,
            max_processes: 256,
            max_file_bytes: 8 * 1024 * 1024,
        }
    }
}

impl ResourceLimits {
    /// Apply all limits to the calling process.
    ///
    /// Runs in the pre-exec child context, so it only performs raw
    /// `setrlimit` calls.
    pub(crate) fn apply(&self) -> std::io::Result<()> {
        Resource::AS.set(self.memory_bytes, self.memory_bytes)?;
        Resource::CPU.set(self.cpu_secs, self.cpu_secs)?;
        Resource::NPROC.set(self.max_processes, self.max_processes)?;
        Resource::FSIZE.set(self.max_file_bytes, self.max_file_bytes)?;
        // No core dumps from crashed submissions.
        Resource::CORE.set(0, 0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.memory_bytes, 256 * 1024 * 1024);
        assert_eq!(limits.cpu_secs, 30);
        assert_eq!(limits.max_processes, 256);
        assert_eq!(limits.max_file_bytes, 8 * 1024 * 1024);
    }
}
