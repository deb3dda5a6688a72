//! Public likelihood engine: drives the dispatch pipeline across each
//! read's full haplotype list and assembles the per-read, per-allele
//! log10-likelihood map.

use std::fmt;
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

use crate::device::{self, AcceleratorDevice, DeviceError};
use crate::types::{Haplotype, LikelihoodMap, ReadRecord};

mod batch;
mod queue;

pub use batch::{BatchDispatcher, FallbackPolicy, DEFAULT_TRUST_THRESHOLD};
pub use queue::{QueueError, ResultReorderQueue};

/// Default in-flight pair count at which the dispatcher proactively
/// flushes the device.
pub const DEFAULT_FLUSH_WATERMARK: usize = 1024;

/// How the engine binds to the optional accelerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcceleratorMode {
    /// Use the accelerator when present, otherwise the software kernel.
    #[default]
    Auto,
    /// Software kernel only, even when hardware is present.
    Disabled,
    /// Fail at startup unless the accelerator is present.
    Required,
}

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// In-flight pairs triggering a proactive flush.
    pub flush_watermark: usize,
    /// Trust threshold for accelerated scores (log10 units).
    pub trust_threshold: f64,
    /// Accelerator binding policy.
    pub mode: AcceleratorMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            flush_watermark: DEFAULT_FLUSH_WATERMARK,
            trust_threshold: DEFAULT_TRUST_THRESHOLD,
            mode: AcceleratorMode::Auto,
        }
    }
}

impl EngineConfig {
    /// Override the proactive flush watermark.
    pub fn with_flush_watermark(mut self, watermark: usize) -> Self {
        self.flush_watermark = watermark;
        self
    }

    /// Override the accelerator trust threshold.
    pub fn with_trust_threshold(mut self, threshold: f64) -> Self {
        self.trust_threshold = threshold;
        self
    }

    /// Override the accelerator binding policy.
    pub fn with_accelerator_mode(mut self, mode: AcceleratorMode) -> Self {
        self.mode = mode;
        self
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.flush_watermark == 0 {
            return Err(EngineError::InvalidConfiguration(
                "flush watermark must be at least 1".to_string(),
            ));
        }
        if !self.trust_threshold.is_finite() || self.trust_threshold >= 0.0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "trust threshold must be finite and negative, got {}",
                self.trust_threshold
            )));
        }
        Ok(())
    }
}

/// Errors returned by the public engine API.
///
/// The engine either returns the complete likelihood map or fails the
/// whole call; partial results are never surfaced.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine parameters rejected at construction.
    #[error("invalid engine configuration: {0}")]
    InvalidConfiguration(String),

    /// Accelerator startup failure (requested but unavailable, or vendor
    /// bring-up rejected).
    #[error("accelerator error: {0}")]
    Device(#[from] DeviceError),

    /// A call supplied no candidate haplotypes.
    #[error("haplotype list must not be empty")]
    NoHaplotypes,
}

enum DeviceBinding {
    Software,
    Owned(Box<dyn AcceleratorDevice + Send>),
    Shared(&'static Mutex<Box<dyn AcceleratorDevice + Send>>),
}

impl fmt::Debug for DeviceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceBinding::Software => f.write_str("Software"),
            DeviceBinding::Owned(_) => f.write_str("Owned(..)"),
            DeviceBinding::Shared(_) => f.write_str("Shared(..)"),
        }
    }
}

/// Batched read-versus-haplotype likelihood engine.
///
/// One engine instance is a single sequential dispatch context: calls must
/// be externally serialized, or each concurrent worker must own its own
/// instance. When bound to the process-wide device, the engine holds the
/// device lock for the whole of one call, so submissions and their drains
/// never interleave with another thread's.
#[derive(Debug)]
pub struct LikelihoodEngine {
    dispatcher: BatchDispatcher,
    binding: DeviceBinding,
}

impl LikelihoodEngine {
    /// Engine bound per `config.mode`: `Auto` probes the process-wide
    /// device and quietly falls back to software; `Required` fails here,
    /// once, if the device is absent.
    pub fn from_config(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let binding = match config.mode {
            AcceleratorMode::Disabled => DeviceBinding::Software,
            AcceleratorMode::Required => DeviceBinding::Shared(device::acquire()?),
            AcceleratorMode::Auto => match device::acquire() {
                Ok(shared) => DeviceBinding::Shared(shared),
                Err(err) => {
                    debug!(%err, "no accelerator; using software kernel");
                    DeviceBinding::Software
                }
            },
        };
        Ok(Self {
            dispatcher: Self::dispatcher_for(&config),
            binding,
        })
    }

    /// Engine that only ever uses the software kernel.
    pub fn software_only() -> Self {
        Self {
            dispatcher: Self::dispatcher_for(&EngineConfig::default()),
            binding: DeviceBinding::Software,
        }
    }

    /// Engine owning the given device exclusively. The device is
    /// initialized here; bring-up failure fails construction.
    pub fn with_device(
        mut device: Box<dyn AcceleratorDevice + Send>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        device.initialize()?;
        Ok(Self {
            dispatcher: Self::dispatcher_for(&config),
            binding: DeviceBinding::Owned(device),
        })
    }

    fn dispatcher_for(config: &EngineConfig) -> BatchDispatcher {
        BatchDispatcher::new(
            FallbackPolicy::new(config.trust_threshold),
            config.flush_watermark,
        )
    }

    /// Compute log10-likelihoods for every read against every haplotype.
    ///
    /// Haplotype order is preserved end to end; the caller is assumed to
    /// have deduplicated haplotypes per allele. Returns the complete map
    /// or fails the whole call.
    pub fn compute_likelihoods(
        &mut self,
        reads: &[ReadRecord],
        haplotypes: &[Haplotype],
    ) -> Result<LikelihoodMap, EngineError> {
        if haplotypes.is_empty() {
            return Err(EngineError::NoHaplotypes);
        }

        let mut device: Option<&mut (dyn AcceleratorDevice + Send)> = None;
        let mut shared_guard;
        match &mut self.binding {
            DeviceBinding::Software => {}
            DeviceBinding::Owned(dev) => device = Some(&mut **dev),
            DeviceBinding::Shared(shared) => {
                shared_guard = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                device = Some(&mut **shared_guard);
            }
        }

        // Phase one: submit every read's full list, in order.
        for read in reads {
            self.dispatcher.submit(device.as_deref_mut(), read, haplotypes);
        }

        // Phase two: resolve scores strictly in submission order.
        let mut map = LikelihoodMap::new();
        while let Some(scores) = self.dispatcher.collect_next() {
            let row = haplotypes
                .iter()
                .map(|hap| hap.allele.clone())
                .zip(scores)
                .collect();
            map.push_row(row);
        }
        Ok(map)
    }
}
