use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Number of admitted task lineages that have not been retired yet.
///
/// Incremented once when an extraction task is admitted and decremented once
/// when its lineage ends, whichever stage that happens in. Clones share the
/// same counter.
#[derive(Debug, Clone, Default)]
pub struct PendingCounter {
    value: Arc<AtomicI64>,
}

impl PendingCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly admitted lineage.
    #[inline]
    pub fn admit(&self) {
        self.value.fetch_add(1, Ordering::SeqCst);
    }

    /// Retires a lineage and returns the number still pending.
    #[inline]
    pub fn retire(&self) -> i64 {
        let previous = self.value.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "retired more lineages than were admitted");
        previous - 1
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.get() == 0
    }
}
