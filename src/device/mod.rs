//! Narrow abstraction over the optional hardware accelerator.
//!
//! The device is an untagged ordered pipe exposing four opaque operations;
//! correctness of the overall engine rests on submission-order discipline,
//! not on anything the device reports. Exactly one production binding
//! exists (the feature-gated vendor library in [`fpga`]) and one
//! deterministic in-memory test double ([`mock::MockAccelerator`]). Core
//! algorithmic code never touches hardware directly.

use std::path::Path;
use std::sync::{Mutex, OnceLock};

use thiserror::Error;

use crate::types::ReadRecord;

#[cfg(feature = "fpga")]
mod fpga;
pub mod mock;

#[cfg(feature = "fpga")]
pub use fpga::FpgaAccelerator;

/// Known location of the vendor accelerator library; its presence is the
/// startup availability probe.
pub const DEVICE_ARTIFACT: &str = "/opt/hmmaccel/lib/libhmm_accel.so";

/// Errors surfaced by the accelerator binding.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    /// The accelerator was requested but its artifact is absent.
    #[error("accelerator unavailable: {artifact} not found")]
    Unavailable {
        /// Artifact whose presence was probed.
        artifact: String,
    },
    /// The vendor library rejected initialization.
    #[error("accelerator initialization failed: {0}")]
    InitFailed(String),
}

/// Outcome of submitting one pair to the device queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueStatus {
    /// The pair was accepted and will be scored by a later flush.
    Accepted,
    /// The device queue is at capacity; nothing was accepted.
    QueueFull,
}

/// One (read, haplotype) scoring task, borrowed for the enqueue call.
#[derive(Debug, Clone, Copy)]
pub struct PairTask<'a> {
    /// Candidate haplotype bases.
    pub hap_bases: &'a [u8],
    /// The read and its quality arrays.
    pub read: &'a ReadRecord,
    /// First column to evaluate when reusing a shared haplotype prefix.
    /// The dispatcher always submits 0; the window exists for callers
    /// driving a device directly with presorted haplotypes.
    pub hap_start: usize,
    /// Whether the device must rebuild its read-derived tables.
    pub recache: bool,
}

/// The four-operation accelerator interface.
///
/// `flush` emits all pending results as one batch and reports its length;
/// `dequeue` copies that batch out in submission order. The pipe carries
/// no pair identifiers.
pub trait AcceleratorDevice: Send {
    /// One-time device bring-up. Idempotent.
    fn initialize(&mut self) -> Result<(), DeviceError>;

    /// Submit one pair for scoring.
    fn enqueue(&mut self, task: &PairTask<'_>) -> EnqueueStatus;

    /// Force all pending pairs to complete; returns the result count now
    /// retrievable through `dequeue`.
    fn flush(&mut self) -> usize;

    /// Copy up to `out.len()` completed results, front to back; returns
    /// the number written.
    fn dequeue(&mut self, out: &mut [f64]) -> usize;
}

/// Whether the production accelerator can be used in this process.
pub fn accelerator_available() -> bool {
    cfg!(feature = "fpga") && Path::new(DEVICE_ARTIFACT).exists()
}

type SharedDevice = Mutex<Box<dyn AcceleratorDevice + Send>>;

static DEVICE: OnceLock<Result<SharedDevice, DeviceError>> = OnceLock::new();

/// Acquire the process-wide accelerator handle.
///
/// The first call probes and initializes the device; every later call
/// returns the same handle (or the same startup error). The device is
/// never torn down or reinitialized for the life of the process. Callers
/// sharing the handle across threads must hold the lock for a read's full
/// submit-and-drain sequence.
pub fn acquire() -> Result<&'static SharedDevice, DeviceError> {
    let slot = DEVICE.get_or_init(|| {
        if !accelerator_available() {
            return Err(DeviceError::Unavailable {
                artifact: DEVICE_ARTIFACT.to_string(),
            });
        }
        #[cfg(feature = "fpga")]
        {
            let mut device = FpgaAccelerator::new();
            device.initialize()?;
            tracing::info!("accelerator initialized");
            Ok(Mutex::new(
                Box::new(device) as Box<dyn AcceleratorDevice + Send>
            ))
        }
        #[cfg(not(feature = "fpga"))]
        Err(DeviceError::Unavailable {
            artifact: DEVICE_ARTIFACT.to_string(),
        })
    });
    match slot {
        Ok(shared) => Ok(shared),
        Err(err) => Err(err.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(feature = "fpga"))]
    fn acquire_without_hardware_reports_unavailable() {
        // The default build carries no vendor binding, so the singleton
        // resolves to the startup configuration error, idempotently.
        let first = acquire().err().expect("no accelerator in default builds");
        let second = acquire().err().expect("no accelerator in default builds");
        assert!(matches!(first, DeviceError::Unavailable { .. }));
        assert_eq!(first.to_string(), second.to_string());
    }
}
