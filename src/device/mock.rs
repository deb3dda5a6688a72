//! Deterministic in-memory accelerator double.
//!
//! Scores pairs with the software kernel so expected values are exact,
//! while reproducing the device's observable quirks: a bounded request
//! queue, flushes that may split results across batches, reduced-precision
//! answers for chosen submissions, and short dequeues. All behavior is
//! fixed at construction; there is no randomness.

use std::collections::VecDeque;

use super::{AcceleratorDevice, DeviceError, EnqueueStatus, PairTask};
use crate::pairhmm::ForwardKernel;

/// Score reported for corrupted submissions; sits below the engine's
/// trust threshold so the fallback path fires.
pub const CORRUPTED_SCORE: f64 = -75.0;

/// Configurable in-memory stand-in for the hardware device.
#[derive(Debug)]
pub struct MockAccelerator {
    kernel: ForwardKernel,
    queue_depth: usize,
    max_results_per_flush: Option<usize>,
    dequeue_deficit: usize,
    corrupted: Vec<usize>,
    pending: VecDeque<f64>,
    staged: VecDeque<f64>,
    submissions: usize,
    flushes: usize,
    initialized: bool,
}

impl MockAccelerator {
    /// Create a double whose request queue holds `queue_depth` pairs.
    pub fn new(queue_depth: usize) -> Self {
        Self {
            kernel: ForwardKernel::new(),
            queue_depth,
            max_results_per_flush: None,
            dequeue_deficit: 0,
            corrupted: Vec::new(),
            pending: VecDeque::new(),
            staged: VecDeque::new(),
            submissions: 0,
            flushes: 0,
            initialized: false,
        }
    }

    /// Cap the number of results emitted by a single flush, splitting one
    /// read's scores across several batches.
    pub fn with_max_results_per_flush(mut self, max: usize) -> Self {
        self.max_results_per_flush = Some(max);
        self
    }

    /// Report the given submissions (0-based, in global submission order)
    /// as [`CORRUPTED_SCORE`] instead of the true likelihood.
    pub fn with_corrupted_submissions(mut self, indices: &[usize]) -> Self {
        self.corrupted = indices.to_vec();
        self
    }

    /// Make the next dequeue deliver `deficit` fewer results than declared
    /// by the preceding flush, dropping the lost results outright. One
    /// shot: later dequeues behave normally, simulating a transient
    /// device-side underflow.
    pub fn with_dequeue_deficit(mut self, deficit: usize) -> Self {
        self.dequeue_deficit = deficit;
        self
    }

    /// Total pairs accepted so far.
    pub fn submissions(&self) -> usize {
        self.submissions
    }

    /// Number of flush calls observed.
    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl AcceleratorDevice for MockAccelerator {
    fn initialize(&mut self) -> Result<(), DeviceError> {
        self.initialized = true;
        Ok(())
    }

    fn enqueue(&mut self, task: &PairTask<'_>) -> EnqueueStatus {
        if self.pending.len() >= self.queue_depth {
            return EnqueueStatus::QueueFull;
        }
        let score = self
            .kernel
            .likelihood(task.hap_bases, task.read, task.hap_start, task.recache);
        let index = self.submissions;
        self.submissions += 1;
        let score = if self.corrupted.contains(&index) {
            CORRUPTED_SCORE
        } else {
            score
        };
        self.pending.push_back(score);
        EnqueueStatus::Accepted
    }

    fn flush(&mut self) -> usize {
        self.flushes += 1;
        let available = self.pending.len();
        let emit = match self.max_results_per_flush {
            Some(max) => available.min(max),
            None => available,
        };
        for _ in 0..emit {
            // Queue is drained front to back; ordering is the contract.
            let score = self.pending.pop_front().unwrap_or(f64::NAN);
            self.staged.push_back(score);
        }
        emit
    }

    fn dequeue(&mut self, out: &mut [f64]) -> usize {
        let available = self.staged.len().min(out.len());
        let deficit = std::mem::take(&mut self.dequeue_deficit).min(available);
        let deliver = available - deficit;
        for slot in out.iter_mut().take(deliver) {
            *slot = self.staged.pop_front().unwrap_or(f64::NAN);
        }
        // Lost results are gone for good; they must not surface in a
        // later batch.
        for _ in 0..deficit {
            self.staged.pop_front();
        }
        deliver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReadRecord;

    fn task<'a>(read: &'a ReadRecord, hap: &'a [u8], recache: bool) -> PairTask<'a> {
        PairTask {
            hap_bases: hap,
            read,
            hap_start: 0,
            recache,
        }
    }

    #[test]
    fn bounded_queue_rejects_overflow() {
        let read = ReadRecord::with_uniform_quals(b"ACGT".to_vec(), 30);
        let mut device = MockAccelerator::new(2);
        assert_eq!(device.enqueue(&task(&read, b"ACGT", true)), EnqueueStatus::Accepted);
        assert_eq!(device.enqueue(&task(&read, b"ACGA", false)), EnqueueStatus::Accepted);
        assert_eq!(device.enqueue(&task(&read, b"ACGC", false)), EnqueueStatus::QueueFull);

        // Flushing drains the queue and restores capacity.
        let n = device.flush();
        assert_eq!(n, 2);
        let mut buf = vec![0.0; n];
        assert_eq!(device.dequeue(&mut buf), 2);
        assert_eq!(device.enqueue(&task(&read, b"ACGC", false)), EnqueueStatus::Accepted);
    }

    #[test]
    fn split_flushes_preserve_submission_order() {
        let read = ReadRecord::with_uniform_quals(b"ACGT".to_vec(), 30);
        let haps: [&[u8]; 3] = [b"ACGT", b"ACGA", b"TCGT"];
        let mut reference = ForwardKernel::new();
        let expected: Vec<f64> = haps
            .iter()
            .map(|h| reference.likelihood(h, &read, 0, true))
            .collect();

        let mut device = MockAccelerator::new(16).with_max_results_per_flush(2);
        for (j, hap) in haps.iter().enumerate() {
            assert_eq!(device.enqueue(&task(&read, hap, j == 0)), EnqueueStatus::Accepted);
        }

        let mut drained = Vec::new();
        loop {
            let n = device.flush();
            if n == 0 {
                break;
            }
            let mut buf = vec![0.0; n];
            assert_eq!(device.dequeue(&mut buf), n);
            drained.extend(buf);
        }
        assert_eq!(drained, expected);
    }

    #[test]
    fn dequeue_deficit_is_one_shot_and_lossy() {
        let read = ReadRecord::with_uniform_quals(b"ACGT".to_vec(), 30);
        let mut reference = ForwardKernel::new();
        let late_score = reference.likelihood(b"TCGT", &read, 0, true);

        let mut device = MockAccelerator::new(4).with_dequeue_deficit(1);
        device.enqueue(&task(&read, b"ACGT", true));
        device.enqueue(&task(&read, b"ACGA", false));
        let declared = device.flush();
        assert_eq!(declared, 2);
        let mut buf = vec![0.0; declared];
        assert_eq!(device.dequeue(&mut buf), 1);

        // The shorted result is dropped, not redelivered: the next flush
        // carries only the next submission's score.
        device.enqueue(&task(&read, b"TCGT", false));
        let declared = device.flush();
        assert_eq!(declared, 1);
        let mut buf = vec![0.0; declared];
        assert_eq!(device.dequeue(&mut buf), 1);
        assert_eq!(buf[0], late_score);
    }

    #[test]
    fn corrupted_submissions_report_untrusted_scores() {
        let read = ReadRecord::with_uniform_quals(b"ACGT".to_vec(), 30);
        let mut device = MockAccelerator::new(4).with_corrupted_submissions(&[1]);
        device.enqueue(&task(&read, b"ACGT", true));
        device.enqueue(&task(&read, b"ACGA", false));
        let n = device.flush();
        let mut buf = vec![0.0; n];
        device.dequeue(&mut buf);
        assert!(buf[0] > -60.0);
        assert_eq!(buf[1], CORRUPTED_SCORE);
    }
}
