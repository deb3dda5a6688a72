//! Per-read dispatch of haplotype pairs to the accelerator or the
//! software kernel, and strictly ordered collection of their scores.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::device::{AcceleratorDevice, EnqueueStatus, PairTask};
use crate::engine::queue::{QueueError, ResultReorderQueue};
use crate::pairhmm::ForwardKernel;
use crate::types::{Haplotype, ReadRecord};

/// Accelerated scores at or below this log10 value are discarded and
/// recomputed exactly; the device's reduced-precision arithmetic is not
/// reliable in that range.
pub const DEFAULT_TRUST_THRESHOLD: f64 = -60.0;

/// Decides whether an accelerated score can be reported as-is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackPolicy {
    threshold: f64,
}

impl FallbackPolicy {
    /// Policy with an explicit trust threshold (log10 units).
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// The configured trust threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// True when the raw score may be reported without recomputation.
    /// Non-finite scores are never trusted.
    pub fn trusts(&self, score: f64) -> bool {
        score.is_finite() && score > self.threshold
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TRUST_THRESHOLD)
    }
}

#[derive(Debug)]
struct PendingRead {
    read: ReadRecord,
    haps: Vec<Haplotype>,
    /// Scores resolved in software at submit time; `None` entries are
    /// drained from the result queue in submission order.
    prefilled: Vec<Option<f64>>,
}

/// Routes each (read, haplotype) pair to the accelerator queue or the
/// software kernel, and later resolves scores in submission order.
///
/// Not safe for concurrent invocation; one dispatcher per engine instance,
/// serialized externally.
#[derive(Debug)]
pub struct BatchDispatcher {
    kernel: ForwardKernel,
    queue: ResultReorderQueue,
    fallback: FallbackPolicy,
    /// In-flight pair count that triggers a proactive flush.
    flush_watermark: usize,
    in_flight: usize,
    pending: VecDeque<PendingRead>,
}

impl BatchDispatcher {
    /// Create a dispatcher with the given fallback policy and proactive
    /// flush watermark.
    pub fn new(fallback: FallbackPolicy, flush_watermark: usize) -> Self {
        Self {
            kernel: ForwardKernel::new(),
            queue: ResultReorderQueue::new(),
            fallback,
            flush_watermark,
            in_flight: 0,
            pending: VecDeque::new(),
        }
    }

    /// Submit one read's full haplotype list.
    ///
    /// With a device, pairs are enqueued in order with `recache` true only
    /// for the first; a final unconditional flush guarantees the scores are
    /// available before [`collect_next`](Self::collect_next) asks for them.
    /// Without a device every pair is scored by the kernel immediately.
    pub fn submit<'d>(
        &mut self,
        device: Option<&mut (dyn AcceleratorDevice + Send + 'd)>,
        read: &ReadRecord,
        haps: &[Haplotype],
    ) {
        match device {
            Some(dev) => self.submit_to_device(dev, read, haps),
            None => self.submit_software(read, haps),
        }
    }

    /// Resolve the scores for the oldest submitted read, in its haplotype
    /// order. Returns `None` once every submitted read has been collected.
    pub fn collect_next(&mut self) -> Option<Vec<f64>> {
        let pending = self.pending.pop_front()?;
        let mut scores = Vec::with_capacity(pending.haps.len());

        for (j, hap) in pending.haps.iter().enumerate() {
            let score = match pending.prefilled[j] {
                Some(resolved) => resolved,
                None => match self.queue.pop() {
                    Ok(raw) if self.fallback.trusts(raw) => raw,
                    Ok(raw) => {
                        debug!(
                            raw,
                            threshold = self.fallback.threshold(),
                            "untrusted accelerated score; recomputing exactly"
                        );
                        self.kernel.likelihood(&hap.bases, &pending.read, 0, true)
                    }
                    Err(QueueError::Underflow) => {
                        warn!("result queue underflow; recomputing pair in software");
                        self.kernel.likelihood(&hap.bases, &pending.read, 0, true)
                    }
                },
            };
            scores.push(score);
        }

        Some(scores)
    }

    /// Number of submitted reads not yet collected.
    pub fn pending_reads(&self) -> usize {
        self.pending.len()
    }

    fn submit_to_device<'d>(
        &mut self,
        dev: &mut (dyn AcceleratorDevice + Send + 'd),
        read: &ReadRecord,
        haps: &[Haplotype],
    ) {
        let mut prefilled = vec![None; haps.len()];
        let mut j = 0;

        while j < haps.len() {
            if self.in_flight >= self.flush_watermark {
                self.drain(dev);
            }

            let task = PairTask {
                hap_bases: &haps[j].bases,
                read,
                hap_start: 0,
                recache: j == 0,
            };
            match dev.enqueue(&task) {
                EnqueueStatus::Accepted => {
                    self.in_flight += 1;
                    j += 1;
                }
                EnqueueStatus::QueueFull => {
                    debug!("device queue full; flushing before retry");
                    self.drain(dev);
                    if dev.enqueue(&task) == EnqueueStatus::Accepted {
                        self.in_flight += 1;
                        j += 1;
                    } else {
                        // The device will not take more work; the rest of
                        // this read's list is scored by the kernel. Nothing
                        // is dropped.
                        warn!(
                            remaining = haps.len() - j,
                            "device rejected retry after flush; scoring remainder in software"
                        );
                        for (k, hap) in haps.iter().enumerate().skip(j) {
                            let score =
                                self.kernel.likelihood(&hap.bases, read, 0, k == j);
                            prefilled[k] = Some(score);
                        }
                        break;
                    }
                }
            }
        }

        // Results must be available before retrieval is requested.
        self.drain_fully(dev);

        self.pending.push_back(PendingRead {
            read: read.clone(),
            haps: haps.to_vec(),
            prefilled,
        });
    }

    fn submit_software(&mut self, read: &ReadRecord, haps: &[Haplotype]) {
        let prefilled = haps
            .iter()
            .enumerate()
            .map(|(j, hap)| Some(self.kernel.likelihood(&hap.bases, read, 0, j == 0)))
            .collect();
        self.pending.push_back(PendingRead {
            read: read.clone(),
            haps: haps.to_vec(),
            prefilled,
        });
    }

    /// One flush-and-dequeue round. A count mismatch is a defect: the
    /// batch is replaced by non-finite markers, one per covered
    /// submission, so exactly the affected pairs fall back to software
    /// while later flushes keep their alignment.
    fn drain(&mut self, dev: &mut (dyn AcceleratorDevice + Send)) {
        let declared = dev.flush();
        if declared == 0 {
            return;
        }
        self.in_flight = self.in_flight.saturating_sub(declared);

        let mut batch = vec![0.0; declared];
        let got = dev.dequeue(&mut batch);
        if got != declared {
            warn!(
                declared,
                got, "dequeue count mismatch; affected pairs will be recomputed"
            );
            self.queue.push_batch(vec![f64::NAN; declared]);
            return;
        }
        self.queue.push_batch(batch);
    }

    fn drain_fully(&mut self, dev: &mut (dyn AcceleratorDevice + Send)) {
        while self.in_flight > 0 {
            let before = self.in_flight;
            self.drain(dev);
            if self.in_flight == before {
                break;
            }
        }
    }
}
