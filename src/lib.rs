//! # Batched Read-vs-Haplotype Likelihood Engine
//!
//! This library computes, for a sequencing read and a candidate genomic
//! haplotype, the log10-probability that the read was generated by that
//! haplotype under a position-specific base-error model, the numeric
//! primitive at the center of genotype inference.
//!
//! ## Core pipeline
//!
//! 1. **Error model derivation**: per-base Phred qualities become
//!    linear-domain transition/emission tables, cached per read
//! 2. **Forward kernel**: three-state (Match/Insert/Delete) pair-HMM
//!    recursion over the (read+1)×(haplotype+1) grid
//! 3. **Batched dispatch**: pairs are pipelined to an optional hardware
//!    accelerator through a bounded queue; results drain in strict
//!    submission order because the pipe carries no identifiers
//! 4. **Fallback**: accelerated scores at or below the trust threshold
//!    are recomputed exactly by the software kernel
//!
//! ## Usage example
//!
//! ```
//! use readlik::{Haplotype, LikelihoodEngine, ReadRecord};
//!
//! let reads = [ReadRecord::with_quals(b"ACGTACGT".to_vec(), 30, 45, 40, 10)];
//! let haplotypes = [
//!     Haplotype::new("ref", b"ACGTACGTACGT".to_vec()),
//!     Haplotype::new("alt", b"ACGAACGTACGT".to_vec()),
//! ];
//!
//! let mut engine = LikelihoodEngine::software_only();
//! let map = engine.compute_likelihoods(&reads, &haplotypes).unwrap();
//! assert!(map.get(0, "ref").unwrap() > map.get(0, "alt").unwrap());
//! ```

#![warn(missing_docs, missing_debug_implementations)]
#![allow(clippy::new_without_default)]

pub mod device; // Accelerator abstraction, probe, process singleton
pub mod engine; // Dispatch, reorder queue, fallback, public API
pub mod pairhmm; // Error model tables and the forward kernel
pub mod types; // Read, haplotype and likelihood-map value types

// Re-exports for convenience
pub use device::{AcceleratorDevice, DeviceError, EnqueueStatus, PairTask};
pub use engine::{
    AcceleratorMode, BatchDispatcher, EngineConfig, EngineError, FallbackPolicy,
    LikelihoodEngine, QueueError, ResultReorderQueue, DEFAULT_TRUST_THRESHOLD,
};
pub use pairhmm::{ForwardKernel, ReadErrorModel, LIKELIHOOD_FLOOR};
pub use types::{Haplotype, LikelihoodMap, ReadError, ReadRecord};
