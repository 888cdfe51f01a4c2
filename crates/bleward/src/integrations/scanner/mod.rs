mod command;

use std::process::ExitStatus;
use std::time::Duration;

use async_trait::async_trait;
pub use command::parse_discovery_line;
pub use command::CommandScanner;
pub use command::Config as CommandScannerConfig;

use crate::device::DiscoveredDevice;

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Failed to start scan command `{0}`: {1}")]
    Spawn(String, #[source] std::io::Error),

    #[error("Scan command `{0}` timed out after {1:?}")]
    Timeout(String, Duration),

    #[error("Scan command `{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("Invalid discovery record on line {line}: {message}")]
    InvalidRecord { line: usize, message: String },

    #[error("Scanner unavailable: {0}")]
    Unavailable(String),
}

/// Source of discovery batches.
///
/// Called once per cycle. A batch may be empty; an error aborts the cycle before anything is
/// classified or written.
#[async_trait]
pub trait Scanner: Send {
    /// Get the name of this scanner for logging
    fn name(&self) -> &str;

    /// Run one discovery pass
    async fn discover(&mut self) -> Result<Vec<DiscoveredDevice>, ScanError>;
}

/// Mock scanner for testing
///
/// Returns queued results in order, then empty batches.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockScanner {
    pub results: std::collections::VecDeque<Result<Vec<DiscoveredDevice>, ScanError>>,
    pub calls: usize,
}

#[cfg(test)]
impl MockScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_batch(&mut self, batch: Vec<DiscoveredDevice>) {
        self.results.push_back(Ok(batch));
    }

    pub fn push_error(&mut self, error: ScanError) {
        self.results.push_back(Err(error));
    }
}

#[cfg(test)]
#[async_trait]
impl Scanner for MockScanner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn discover(&mut self) -> Result<Vec<DiscoveredDevice>, ScanError> {
        self.calls += 1;
        self.results.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}
