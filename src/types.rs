use std::sync::Arc;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::Serialize;

/// Errors raised while constructing engine inputs.
#[derive(Debug, Error)]
pub enum ReadError {
    /// A per-base auxiliary array does not match the base sequence length.
    #[error("{array} length {got} does not match read length {expected}")]
    LengthMismatch {
        /// Name of the offending quality array.
        array: &'static str,
        /// Length of the offending array.
        got: usize,
        /// Length of the base sequence.
        expected: usize,
    },
}

/// One sequencing read together with its position-specific error profile.
///
/// All four quality arrays are Phred-scaled and must match the base
/// sequence length; the constructor enforces this. Storage is shared so a
/// read can be handed to the engine without copying.
#[derive(Debug, Clone)]
pub struct ReadRecord {
    /// Base sequence over {A, C, G, T, N}, uppercase ASCII.
    pub bases: Arc<[u8]>,
    /// Per-base call quality.
    pub base_quals: Arc<[u8]>,
    /// Per-base insertion-open quality.
    pub ins_quals: Arc<[u8]>,
    /// Per-base deletion-open quality.
    pub del_quals: Arc<[u8]>,
    /// Per-base gap-continuation quality.
    pub gap_quals: Arc<[u8]>,
}

impl ReadRecord {
    /// Construct a read, validating that every quality array matches the
    /// base sequence length.
    pub fn new(
        bases: impl Into<Arc<[u8]>>,
        base_quals: impl Into<Arc<[u8]>>,
        ins_quals: impl Into<Arc<[u8]>>,
        del_quals: impl Into<Arc<[u8]>>,
        gap_quals: impl Into<Arc<[u8]>>,
    ) -> Result<Self, ReadError> {
        let read = Self {
            bases: bases.into(),
            base_quals: base_quals.into(),
            ins_quals: ins_quals.into(),
            del_quals: del_quals.into(),
            gap_quals: gap_quals.into(),
        };
        read.check_len("base_quals", read.base_quals.len())?;
        read.check_len("ins_quals", read.ins_quals.len())?;
        read.check_len("del_quals", read.del_quals.len())?;
        read.check_len("gap_quals", read.gap_quals.len())?;
        Ok(read)
    }

    /// Convenience constructor applying one quality to every base and every
    /// quality array. Used heavily in tests and benchmarks.
    pub fn with_uniform_quals(bases: impl Into<Arc<[u8]>>, qual: u8) -> Self {
        Self::with_quals(bases, qual, qual, qual, qual)
    }

    /// Convenience constructor with one scalar per quality array.
    pub fn with_quals(
        bases: impl Into<Arc<[u8]>>,
        base_qual: u8,
        ins_qual: u8,
        del_qual: u8,
        gap_qual: u8,
    ) -> Self {
        let bases = bases.into();
        let len = bases.len();
        Self {
            bases,
            base_quals: vec![base_qual; len].into(),
            ins_quals: vec![ins_qual; len].into(),
            del_quals: vec![del_qual; len].into(),
            gap_quals: vec![gap_qual; len].into(),
        }
    }

    /// Read length in bases.
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    /// True when the read has no bases.
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    fn check_len(&self, array: &'static str, got: usize) -> Result<(), ReadError> {
        if got != self.bases.len() {
            return Err(ReadError::LengthMismatch {
                array,
                got,
                expected: self.bases.len(),
            });
        }
        Ok(())
    }
}

/// A candidate haplotype: one allele's contiguous base sequence.
///
/// Immutable and cheaply cloneable; the engine never mutates it and the
/// same haplotype is shared across many reads and many calls.
#[derive(Debug, Clone)]
pub struct Haplotype {
    /// Allele name this haplotype represents (unique per call site).
    pub allele: Arc<str>,
    /// Candidate base sequence.
    pub bases: Arc<[u8]>,
}

impl Haplotype {
    /// Construct a haplotype for the given allele.
    pub fn new(allele: impl Into<Arc<str>>, bases: impl Into<Arc<[u8]>>) -> Self {
        Self {
            allele: allele.into(),
            bases: bases.into(),
        }
    }

    /// Haplotype length in bases.
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    /// True when the haplotype has no bases.
    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }
}

/// Per-read, per-allele log10-likelihoods, in submission order.
///
/// Row `r` holds the `(allele, log10-likelihood)` pairs for the `r`-th
/// submitted read, ordered exactly as the haplotypes were submitted.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct LikelihoodMap {
    rows: Vec<Vec<(Arc<str>, f64)>>,
}

impl LikelihoodMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one read's ordered `(allele, likelihood)` row.
    pub fn push_row(&mut self, row: Vec<(Arc<str>, f64)>) {
        self.rows.push(row);
    }

    /// Number of reads recorded.
    pub fn num_reads(&self) -> usize {
        self.rows.len()
    }

    /// Ordered `(allele, likelihood)` pairs for one read.
    pub fn row(&self, read_idx: usize) -> Option<&[(Arc<str>, f64)]> {
        self.rows.get(read_idx).map(Vec::as_slice)
    }

    /// Likelihood for a specific read/allele pair.
    pub fn get(&self, read_idx: usize, allele: &str) -> Option<f64> {
        self.rows.get(read_idx)?.iter().find_map(|(a, v)| {
            if a.as_ref() == allele {
                Some(*v)
            } else {
                None
            }
        })
    }
}
