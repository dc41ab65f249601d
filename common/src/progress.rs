//! Cross-worker counters.
//!
//! Workers only ever add; readers sum at the end of the run. Relaxed
//! ordering is enough because the executor joins every worker before the
//! summary is read.

#[derive(Debug, Default)]
pub struct Counter(std::sync::atomic::AtomicU64);

impl Counter {
    pub const fn new() -> Self {
        Self(std::sync::atomic::AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, value: u64) {
        self.0.fetch_add(value, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct SyncProgress {
    pub copied: Counter,
    pub deleted: Counter,
    pub skipped: Counter,
    pub errors: Counter,
    pub bytes_transferred: Counter,
}

impl SyncProgress {
    pub fn new() -> Self {
        Self::default()
    }
}
