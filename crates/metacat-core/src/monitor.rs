//! Progress and cancellation for metadata loads

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

/// Handle passed to every load.
///
/// Loads poll [`LoadMonitor::is_cancelled`] between rows and stop early once
/// the token fires. Cloning the monitor shares the token and the counters.
#[derive(Debug, Clone, Default)]
pub struct LoadMonitor {
    token: CancellationToken,
    progress: Arc<Progress>,
}

#[derive(Debug, Default)]
struct Progress {
    rows_read: AtomicU64,
    objects_loaded: AtomicU64,
}

impl LoadMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monitor driven by an existing cancellation token
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            progress: Arc::default(),
        }
    }

    /// Child monitor: cancelled with this one, cancellable on its own, with
    /// separate counters
    pub fn child(&self) -> Self {
        Self::with_token(self.token.child_token())
    }

    pub fn cancel(&self) {
        tracing::debug!("metadata load cancellation requested");
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn row_read(&self) {
        self.progress.rows_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn object_loaded(&self) {
        self.progress.objects_loaded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rows_read(&self) -> u64 {
        self.progress.rows_read.load(Ordering::Relaxed)
    }

    pub fn objects_loaded(&self) -> u64 {
        self.progress.objects_loaded.load(Ordering::Relaxed)
    }
}
