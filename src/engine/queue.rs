//! Strictly ordered drain of raw accelerator result batches.

use std::collections::VecDeque;

use thiserror::Error;

/// Errors raised while draining the result queue.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// A scalar was requested past the last delivered batch.
    #[error("result queue underflow: no delivered batch holds the next result")]
    Underflow,
}

/// FIFO of result batches, drained one scalar at a time in submission
/// order.
///
/// The accelerator pipe carries no pair identifiers, so the k-th popped
/// scalar must be the k-th submitted pair; batch boundaries are an
/// artifact of flush timing and are invisible to consumers. Batches are
/// kept whole with a cursor into the head batch, so no element ever moves.
#[derive(Debug, Default)]
pub struct ResultReorderQueue {
    batches: VecDeque<Vec<f64>>,
    cursor: usize,
}

impl ResultReorderQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one flush's results. Empty batches are dropped.
    pub fn push_batch(&mut self, batch: Vec<f64>) {
        if !batch.is_empty() {
            self.batches.push_back(batch);
        }
    }

    /// Next scalar in strict submission order; the head batch is discarded
    /// once exhausted.
    pub fn pop(&mut self) -> Result<f64, QueueError> {
        let head = self.batches.front().ok_or(QueueError::Underflow)?;
        let value = head[self.cursor];
        self.cursor += 1;
        if self.cursor == head.len() {
            self.batches.pop_front();
            self.cursor = 0;
        }
        Ok(value)
    }

    /// Scalars still available across all batches.
    pub fn len(&self) -> usize {
        let total: usize = self.batches.iter().map(Vec::len).sum();
        total - self.cursor
    }

    /// True when no scalar remains.
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
