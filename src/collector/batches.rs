use std::collections::HashMap;
use std::fmt;

use log::{info, warn};

use crate::error::CollectError;
use crate::metrics::{RuntimeMetrics, METRICS};
use crate::schema::{BatchId, BatchInfo};

/// Progress of one batch.
///
/// INVARIANT:
/// - `remaining <= declared` and never underflows; an extra payload
///   is reported as [`CollectError::BatchOverflow`] instead
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchState {
    pub remaining: u64,
    pub declared: u64,
}

/// Batch bookkeeping for a single batch-bound collection.
///
/// Batches are registered lazily with the size announced by their
/// first payload. Later payloads only count down; a different size
/// on a later payload is logged and ignored.
#[derive(Debug, Default)]
pub struct BatchTracker {
    batches: HashMap<BatchId, BatchState>,
}

impl BatchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one payload against its batch.
    pub fn observe(&mut self, info: &BatchInfo) -> Result<(), CollectError> {
        let state = self
            .batches
            .entry(info.id.clone())
            .or_insert(BatchState {
                remaining: info.size,
                declared: info.size,
            });

        if state.declared != info.size {
            warn!(
                "batch {} announced size {} but was registered with {}",
                info.id, info.size, state.declared
            );
        }

        state.remaining = state
            .remaining
            .checked_sub(1)
            .ok_or_else(|| CollectError::BatchOverflow {
                id: info.id.clone(),
                size: state.declared,
            })?;

        if state.remaining == 0 {
            RuntimeMetrics::incr(&METRICS.batches_completed);
            info!("Batch {} complete ({} problems)", info.id, state.declared);
        }
        Ok(())
    }

    /// Number of distinct batch ids seen so far.
    pub fn distinct(&self) -> usize {
        self.batches.len()
    }

    /// True when no observed batch is still waiting for payloads.
    pub fn is_drained(&self) -> bool {
        self.batches.values().all(|b| b.remaining == 0)
    }

    /// Termination predicate of batch-bound collection.
    ///
    /// Both halves matter: a batch announced after `wanted` others
    /// were already seen still has to be drained.
    pub fn is_complete(&self, wanted: usize) -> bool {
        self.distinct() >= wanted && self.is_drained()
    }

    #[cfg(test)]
    pub fn get(&self, id: &BatchId) -> Option<BatchState> {
        self.batches.get(id).copied()
    }
}

impl fmt::Display for BatchTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.batches.iter().collect();
        ids.sort_by(|a, b| a.0.cmp(b.0));

        f.write_str("{")?;
        for (i, (id, state)) in ids.into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}/{}", id, state.remaining, state.declared)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(id: &str, size: u64) -> BatchInfo {
        BatchInfo {
            id: BatchId::new(id),
            size,
        }
    }

    #[test]
    fn first_payload_registers_and_counts() {
        let mut t = BatchTracker::new();
        t.observe(&info("A", 3)).unwrap();
        assert_eq!(
            t.get(&BatchId::new("A")),
            Some(BatchState {
                remaining: 2,
                declared: 3
            })
        );
        assert!(!t.is_drained());
        assert!(!t.is_complete(1));
    }

    #[test]
    fn completes_once_every_batch_is_drained() {
        let mut t = BatchTracker::new();
        t.observe(&info("A", 1)).unwrap();
        assert!(t.is_complete(1));
        assert!(!t.is_complete(2));

        t.observe(&info("B", 2)).unwrap();
        assert!(!t.is_complete(2));
        t.observe(&info("B", 2)).unwrap();
        assert!(t.is_complete(2));
    }

    #[test]
    fn late_batch_blocks_completion() {
        let mut t = BatchTracker::new();
        t.observe(&info("A", 1)).unwrap();
        t.observe(&info("B", 2)).unwrap();
        assert_eq!(t.distinct(), 2);
        assert!(!t.is_complete(1));
    }

    #[test]
    fn overflow_is_an_error() {
        let mut t = BatchTracker::new();
        t.observe(&info("B", 2)).unwrap();
        t.observe(&info("B", 2)).unwrap();
        let err = t.observe(&info("B", 2)).unwrap_err();
        assert!(matches!(err, CollectError::BatchOverflow { ref id, size: 2 } if *id == BatchId::new("B")));
        assert_eq!(t.get(&BatchId::new("B")).unwrap().remaining, 0);
    }

    #[test]
    fn later_size_is_ignored() {
        let mut t = BatchTracker::new();
        t.observe(&info("A", 2)).unwrap();
        t.observe(&info("A", 5)).unwrap();
        assert!(t.is_complete(1));
    }

    #[test]
    fn display_is_sorted() {
        let mut t = BatchTracker::new();
        t.observe(&info("b", 2)).unwrap();
        t.observe(&info("a", 1)).unwrap();
        assert_eq!(t.to_string(), "{a: 0/1, b: 1/2}");
    }
}
