use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_CYCLE: AtomicU64 = AtomicU64::new(1);

/// Per-cycle context shared by every extension point of one plugin.
///
/// Built from the value returned by the plugin's pre-score phase, then only
/// read. Dropped with the cycle, never reused for another pod.
#[derive(Debug)]
pub struct CycleState<T> {
    cycle: u64,
    data: T,
}

impl<T> CycleState<T> {
    pub fn new(data: T) -> Self {
        Self {
            cycle: NEXT_CYCLE.fetch_add(1, Ordering::Relaxed),
            data,
        }
    }

    /// Process-unique id of the cycle, for logs.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn data(&self) -> &T {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_get_distinct_ids() {
        let a = CycleState::new(1u8);
        let b = CycleState::new(2u8);
        assert_ne!(a.cycle(), b.cycle());
        assert_eq!(*b.data(), 2);
    }
}
