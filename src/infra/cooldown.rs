// ============================================================
// Layer 6 — Cooldown Hook
// ============================================================
// Fixed pause after each group, run through the
// PostBatchHook seam. A zero delay turns it off.

use std::{thread, time::Duration};

use crate::domain::traits::PostBatchHook;

/// Pauses for a fixed delay after every group so the inference
/// backend can release the memory of the last forward pass
/// before the next call lands.
pub struct Cooldown {
    delay: Duration,
}

impl Cooldown {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl PostBatchHook for Cooldown {
    fn after_batch(&mut self, batch_no: usize) {
        if self.delay.is_zero() {
            return;
        }
        tracing::trace!("Group {} done, cooling down for {:?}", batch_no, self.delay);
        thread::sleep(self.delay);
    }
}
