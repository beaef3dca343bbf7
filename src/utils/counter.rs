//! A simple counter for tracking run-wide warnings and errors.
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::SeqCst;

/// Tracks how many entries succeeded, were skipped, warned, or failed
/// over the course of one extract/pack run.
pub struct Counter {
    ok: AtomicUsize,
    skipped: AtomicUsize,
    warning: AtomicUsize,
    error: AtomicUsize,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            ok: AtomicUsize::new(0),
            skipped: AtomicUsize::new(0),
            warning: AtomicUsize::new(0),
            error: AtomicUsize::new(0),
        }
    }

    pub fn inc_ok(&self) {
        self.ok.fetch_add(1, SeqCst);
    }

    pub fn inc_skipped(&self) {
        self.skipped.fetch_add(1, SeqCst);
    }

    pub fn inc_warning(&self) {
        self.warning.fetch_add(1, SeqCst);
    }

    pub fn inc_error(&self) {
        self.error.fetch_add(1, SeqCst);
    }

    pub fn errors(&self) -> usize {
        self.error.load(SeqCst)
    }
}

impl std::fmt::Display for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OK: {}, Skipped: {}, Warnings: {}, Errors: {}",
            self.ok.load(SeqCst),
            self.skipped.load(SeqCst),
            self.warning.load(SeqCst),
            self.error.load(SeqCst),
        )
    }
}
