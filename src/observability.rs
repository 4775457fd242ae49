//! Metrics hook for cached calls.

use std::time::Duration;

/// Receives one event per cache interaction.
///
/// All methods default to no-ops; implement the ones you export.
pub trait CacheMetrics: Send + Sync {
    /// Value served from the store or the in-process memo.
    fn record_hit(&self, _key: &str, _duration: Duration) {}

    /// Key absent; the wrapped callable is about to run.
    fn record_miss(&self, _key: &str, _duration: Duration) {}

    /// Explicit deletion issued.
    fn record_delete(&self, _key: &str) {}

    /// Key building or store access failed. Callable errors are not reported.
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// Metrics sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {}
