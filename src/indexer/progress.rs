use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

/// Shared scan counters; cheap to clone and safe to read while a scan runs.
#[derive(Clone, Default)]
pub struct IndexingProgress {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    files_total: AtomicUsize,
    files_processed: AtomicUsize,
    files_skipped: AtomicUsize,
    symbols_written: AtomicUsize,
    errors: AtomicUsize,
    is_active: AtomicBool,
    started_at: Mutex<Option<Instant>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub is_active: bool,
    pub files_total: usize,
    pub files_processed: usize,
    pub files_skipped: usize,
    pub symbols_written: usize,
    pub errors: usize,
    pub elapsed_ms: u64,
    pub progress_pct: f64,
    pub eta_ms: Option<u64>,
}

impl IndexingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, total_files: usize) {
        self.inner.files_total.store(total_files, Ordering::Release);
        self.inner.files_processed.store(0, Ordering::Release);
        self.inner.files_skipped.store(0, Ordering::Release);
        self.inner.symbols_written.store(0, Ordering::Release);
        self.inner.errors.store(0, Ordering::Release);
        self.inner.is_active.store(true, Ordering::Release);
        *self.inner.started_at.lock() = Some(Instant::now());
    }

    /// A file went through parse and write.
    pub fn inc(&self, symbols_written: usize) {
        self.inner.files_processed.fetch_add(1, Ordering::Relaxed);
        self.inner
            .symbols_written
            .fetch_add(symbols_written, Ordering::Relaxed);
    }

    /// A file was left alone by the mtime gate.
    pub fn inc_skipped(&self) {
        self.inner.files_processed.fetch_add(1, Ordering::Relaxed);
        self.inner.files_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_error(&self) {
        self.inner.files_processed.fetch_add(1, Ordering::Relaxed);
        self.inner.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn finish(&self) {
        self.inner.is_active.store(false, Ordering::Release);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let is_active = self.inner.is_active.load(Ordering::Acquire);
        let files_total = self.inner.files_total.load(Ordering::Acquire);
        let files_processed = self.inner.files_processed.load(Ordering::Acquire);

        let elapsed_ms = self
            .inner
            .started_at
            .lock()
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);

        let progress_pct = if files_total > 0 {
            (files_processed as f64 / files_total as f64) * 100.0
        } else {
            0.0
        };

        let eta_ms = if is_active && files_processed > 0 && files_processed < files_total {
            let remaining = files_total - files_processed;
            let ms_per_file = elapsed_ms as f64 / files_processed as f64;
            Some((remaining as f64 * ms_per_file) as u64)
        } else {
            None
        };

        ProgressSnapshot {
            is_active,
            files_total,
            files_processed,
            files_skipped: self.inner.files_skipped.load(Ordering::Acquire),
            symbols_written: self.inner.symbols_written.load(Ordering::Acquire),
            errors: self.inner.errors.load(Ordering::Acquire),
            elapsed_ms,
            progress_pct,
            eta_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let progress = IndexingProgress::new();
        progress.start(4);
        progress.inc(3);
        progress.inc_skipped();
        progress.inc_error();

        let snapshot = progress.snapshot();
        assert!(snapshot.is_active);
        assert_eq!(snapshot.files_processed, 3);
        assert_eq!(snapshot.files_skipped, 1);
        assert_eq!(snapshot.symbols_written, 3);
        assert_eq!(snapshot.errors, 1);
        assert_eq!(snapshot.progress_pct, 75.0);

        progress.finish();
        assert!(!progress.snapshot().is_active);
        assert!(progress.snapshot().eta_ms.is_none());
    }
}
