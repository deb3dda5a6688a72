//! Production binding to the vendor accelerator library.
//!
//! Compiled only with the `fpga` feature; the vendor library must be
//! present at link time. All marshalling stays inside this module so the
//! rest of the crate sees only the [`AcceleratorDevice`] trait.

use super::{AcceleratorDevice, DeviceError, EnqueueStatus, PairTask};

#[link(name = "hmm_accel")]
extern "C" {
    fn accel_init() -> i32;
    fn accel_enqueue(
        hap_bases: *const u8,
        hap_len: usize,
        read_bases: *const u8,
        read_len: usize,
        base_quals: *const u8,
        ins_quals: *const u8,
        del_quals: *const u8,
        gap_quals: *const u8,
        hap_start: u32,
        recache: bool,
    ) -> i32;
    fn accel_flush() -> i32;
    fn accel_dequeue(out: *mut f64, capacity: usize) -> i32;
}

/// The single production accelerator implementation.
#[derive(Debug, Default)]
pub struct FpgaAccelerator {
    initialized: bool,
}

impl FpgaAccelerator {
    /// Create an uninitialized handle; `initialize` performs bring-up.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AcceleratorDevice for FpgaAccelerator {
    fn initialize(&mut self) -> Result<(), DeviceError> {
        if self.initialized {
            return Ok(());
        }
        let rc = unsafe { accel_init() };
        if rc != 0 {
            return Err(DeviceError::InitFailed(format!(
                "accel_init returned {rc}"
            )));
        }
        self.initialized = true;
        Ok(())
    }

    fn enqueue(&mut self, task: &PairTask<'_>) -> EnqueueStatus {
        let read = task.read;
        let rc = unsafe {
            accel_enqueue(
                task.hap_bases.as_ptr(),
                task.hap_bases.len(),
                read.bases.as_ptr(),
                read.bases.len(),
                read.base_quals.as_ptr(),
                read.ins_quals.as_ptr(),
                read.del_quals.as_ptr(),
                read.gap_quals.as_ptr(),
                task.hap_start as u32,
                task.recache,
            )
        };
        if rc == 0 {
            EnqueueStatus::QueueFull
        } else {
            EnqueueStatus::Accepted
        }
    }

    fn flush(&mut self) -> usize {
        let n = unsafe { accel_flush() };
        n.max(0) as usize
    }

    fn dequeue(&mut self, out: &mut [f64]) -> usize {
        let n = unsafe { accel_dequeue(out.as_mut_ptr(), out.len()) };
        n.max(0) as usize
    }
}
