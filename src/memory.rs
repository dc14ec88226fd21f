//! Memory monitoring capabilities
//!
//! The parser samples a [`MemoryMonitor`] on a fixed line cadence and reacts to
//! the reported pressure. Hosts without introspection use
//! [`NoopMemoryMonitor`], which always reports healthy, so the ceiling logic
//! runs unchanged everywhere.

use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// Memory pressure levels for adaptive behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPressureLevel {
    Unknown,
    Normal,
    High,
    Critical,
}

impl MemoryPressureLevel {
    /// Classify a usage ratio against the high-water and critical marks.
    pub fn classify(ratio: Option<f64>, high_water: f64, critical: f64) -> Self {
        match ratio {
            None => Self::Unknown,
            Some(r) if r >= critical => Self::Critical,
            Some(r) if r >= high_water => Self::High,
            Some(_) => Self::Normal,
        }
    }
}

/// Capability interface for memory introspection.
pub trait MemoryMonitor: Send + Sync {
    /// Fraction of the available budget in use, or `None` when unknown.
    fn usage_ratio(&self) -> Option<f64>;

    /// Report the caller's current estimate of bytes it holds.
    fn observe(&self, _bytes_in_use: usize) {}

    /// Hint that a large amount of memory was just released.
    fn release_hint(&self) {}
}

/// Always healthy; used where the runtime exposes no memory statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMemoryMonitor;

impl MemoryMonitor for NoopMemoryMonitor {
    fn usage_ratio(&self) -> Option<f64> {
        None
    }
}

/// Memory statistics for monitoring
#[derive(Debug, Clone)]
pub struct MemoryStats {
    pub current_usage: usize,
    pub memory_limit: usize,
    pub usage_percentage: f64,
}

/// Compares the caller-reported footprint against a fixed budget.
///
/// The parser calls [`MemoryMonitor::observe`] with its estimate of the dedup
/// map size before each sample, so the ratio tracks the data the parse holds
/// rather than the whole process.
#[derive(Debug)]
pub struct TrackedMemoryMonitor {
    limit_bytes: usize,
    current: AtomicUsize,
}

impl TrackedMemoryMonitor {
    pub fn new(limit_bytes: usize) -> Self {
        Self {
            limit_bytes,
            current: AtomicUsize::new(0),
        }
    }

    pub fn from_megabytes(max_memory_mb: usize) -> Self {
        Self::new(max_memory_mb.saturating_mul(1_000_000))
    }

    pub fn stats(&self) -> MemoryStats {
        let current = self.current.load(Ordering::Relaxed);
        let percentage = if self.limit_bytes > 0 {
            (current as f64 / self.limit_bytes as f64) * 100.0
        } else {
            0.0
        };

        MemoryStats {
            current_usage: current,
            memory_limit: self.limit_bytes,
            usage_percentage: percentage,
        }
    }
}

impl MemoryMonitor for TrackedMemoryMonitor {
    fn usage_ratio(&self) -> Option<f64> {
        if self.limit_bytes == 0 {
            return None;
        }
        Some(self.current.load(Ordering::Relaxed) as f64 / self.limit_bytes as f64)
    }

    fn observe(&self, bytes_in_use: usize) {
        let previous = self.current.swap(bytes_in_use, Ordering::Relaxed);
        if bytes_in_use > self.limit_bytes && previous <= self.limit_bytes {
            warn!(
                usage_mb = bytes_in_use / 1_000_000,
                limit_mb = self.limit_bytes / 1_000_000,
                "Tracked memory exceeds configured limit"
            );
        }
    }

    fn release_hint(&self) {
        self.current.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_monitor_is_always_unknown() {
        let monitor = NoopMemoryMonitor;
        monitor.observe(usize::MAX);
        assert_eq!(monitor.usage_ratio(), None);
        assert_eq!(
            MemoryPressureLevel::classify(monitor.usage_ratio(), 0.8, 0.95),
            MemoryPressureLevel::Unknown
        );
    }

    #[test]
    fn test_tracked_monitor_ratio() {
        let monitor = TrackedMemoryMonitor::new(1_000);
        assert_eq!(monitor.usage_ratio(), Some(0.0));

        monitor.observe(850);
        assert_eq!(monitor.usage_ratio(), Some(0.85));
        assert!((monitor.stats().usage_percentage - 85.0).abs() < 1e-9);

        monitor.release_hint();
        assert_eq!(monitor.usage_ratio(), Some(0.0));
    }

    #[test]
    fn test_zero_limit_reports_unknown() {
        let monitor = TrackedMemoryMonitor::new(0);
        monitor.observe(10);
        assert_eq!(monitor.usage_ratio(), None);
    }

    #[test]
    fn test_pressure_classification() {
        use MemoryPressureLevel::*;
        assert_eq!(MemoryPressureLevel::classify(Some(0.5), 0.8, 0.95), Normal);
        assert_eq!(MemoryPressureLevel::classify(Some(0.8), 0.8, 0.95), High);
        assert_eq!(MemoryPressureLevel::classify(Some(0.99), 0.8, 0.95), Critical);
    }
}
