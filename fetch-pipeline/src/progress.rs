use std::time::Duration;

use tokio::sync::mpsc;

/// One progress update emitted after each candidate completes (successfully
/// or not). Meant for a UI observer; the pipeline never blocks on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchProgress {
    pub completed: usize,
    pub total: usize,
    pub elapsed: Duration,
}

/// Channel end the pipeline writes progress updates to. A dropped receiver
/// is silently ignored.
pub type ProgressSender = mpsc::UnboundedSender<FetchProgress>;
