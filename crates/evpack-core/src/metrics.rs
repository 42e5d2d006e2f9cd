//! Process-wide atomic counters for pack generation.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a CLI command).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    packs_assembled: AtomicU64,
    files_hashed: AtomicU64,
    verify_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            packs_assembled: AtomicU64::new(0),
            files_hashed: AtomicU64::new(0),
            verify_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_packs_assembled(&self) {
        self.packs_assembled.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "packs_assembled", "counter incremented");
    }

    pub fn inc_files_hashed(&self) {
        self.files_hashed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_verify_failures(&self) {
        self.verify_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "verify_failures", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            packs_assembled = self.packs_assembled(),
            files_hashed = self.files_hashed(),
            verify_failures = self.verify_failures(),
        );
    }

    pub fn packs_assembled(&self) -> u64 {
        self.packs_assembled.load(Ordering::Relaxed)
    }

    pub fn files_hashed(&self) -> u64 {
        self.files_hashed.load(Ordering::Relaxed)
    }

    pub fn verify_failures(&self) -> u64 {
        self.verify_failures.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.packs_assembled.store(0, Ordering::Relaxed);
        self.files_hashed.store(0, Ordering::Relaxed);
        self.verify_failures.store(0, Ordering::Relaxed);
    }
}
