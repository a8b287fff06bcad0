use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one connection-handler task for its lifetime. Used to tag
/// table actions so the table engine knows which seat sent them.
pub type ConnId = u64;

#[derive(Debug, Default)]
pub struct ConnIdGenerator {
    next: AtomicU64,
}

impl ConnIdGenerator {
    pub fn new() -> ConnIdGenerator {
        ConnIdGenerator {
            next: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> ConnId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}
