//! Pair-HMM primitives: Phred-derived error model tables and the
//! three-state forward-algorithm kernel.

mod kernel;
mod quals;

pub use kernel::{first_differing_position, ForwardKernel, LIKELIHOOD_FLOOR};
pub use quals::{qual_to_error_prob, qual_to_prob, ReadErrorModel};
