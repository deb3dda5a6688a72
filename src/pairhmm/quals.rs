//! Conversion of per-base Phred qualities into the linear-domain
//! transition and emission probabilities consumed by the forward kernel.
//!
//! The tables depend only on the read, never the haplotype, so they are
//! derived once per read and reused for every candidate haplotype while
//! the caller passes `recache = false`.

use crate::types::ReadRecord;

/// Error probability encoded by a Phred quality: `10^(-Q/10)`.
#[inline]
pub fn qual_to_error_prob(qual: u8) -> f64 {
    10f64.powf(-(qual as f64) / 10.0)
}

/// Probability the base call is correct: `1 - 10^(-Q/10)`.
#[inline]
pub fn qual_to_prob(qual: u8) -> f64 {
    1.0 - qual_to_error_prob(qual)
}

/// Per-read transition and emission tables, indexed by read offset.
///
/// Entry `i` governs the recursion row for read base `i` (row `i + 1` of
/// the dynamic-programming grid).
#[derive(Debug, Clone, Default)]
pub struct ReadErrorModel {
    /// Match state self-transition: `1 - (ins_open + del_open)`, floored at 0.
    pub match_continue: Vec<f64>,
    /// Match -> Insert transition (insertion-open error probability).
    pub ins_open: Vec<f64>,
    /// Match -> Delete transition (deletion-open error probability).
    pub del_open: Vec<f64>,
    /// Gap self-transition (gap-continuation error probability).
    pub gap_extend: Vec<f64>,
    /// Gap -> Match transition: `1 - gap_extend`.
    pub gap_to_match: Vec<f64>,
    /// Emission prior when read and haplotype bases agree.
    pub base_match: Vec<f64>,
    /// Emission prior when they disagree.
    pub base_mismatch: Vec<f64>,
}

impl ReadErrorModel {
    /// Derive the full table set for one read.
    pub fn derive(read: &ReadRecord) -> Self {
        let len = read.len();
        let mut model = Self {
            match_continue: Vec::with_capacity(len),
            ins_open: Vec::with_capacity(len),
            del_open: Vec::with_capacity(len),
            gap_extend: Vec::with_capacity(len),
            gap_to_match: Vec::with_capacity(len),
            base_match: Vec::with_capacity(len),
            base_mismatch: Vec::with_capacity(len),
        };

        for i in 0..len {
            let ins = qual_to_error_prob(read.ins_quals[i]);
            let del = qual_to_error_prob(read.del_quals[i]);
            let gap = qual_to_error_prob(read.gap_quals[i]);
            let err = qual_to_error_prob(read.base_quals[i]);

            model.match_continue.push((1.0 - (ins + del)).max(0.0));
            model.ins_open.push(ins);
            model.del_open.push(del);
            model.gap_extend.push(gap);
            model.gap_to_match.push(1.0 - gap);
            model.base_match.push(1.0 - err);
            model.base_mismatch.push(err);
        }

        model
    }

    /// Number of read positions covered by the tables.
    pub fn len(&self) -> usize {
        self.base_match.len()
    }

    /// True when the model covers no positions.
    pub fn is_empty(&self) -> bool {
        self.base_match.is_empty()
    }
}
