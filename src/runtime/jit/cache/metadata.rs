use std::time::{Duration, Instant};

/// Bookkeeping for one cached specialization.
#[derive(Debug, Clone)]
pub struct CacheMetadata {
    pub created_at: Instant,
    pub last_accessed: Instant,
    pub access_count: u64,
    /// Time spent rendering, compiling and linking the entry.
    pub build_time: Duration,
}

impl CacheMetadata {
    pub fn new(build_time: Duration) -> Self {
        let now = Instant::now();
        Self {
            created_at: now,
            last_accessed: now,
            access_count: 1,
            build_time,
        }
    }

    pub fn record_access(&mut self) {
        self.last_accessed = Instant::now();
        self.access_count += 1;
    }
}

impl Default for CacheMetadata {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}
