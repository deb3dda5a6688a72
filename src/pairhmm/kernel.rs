//! Three-state forward recursion computing the log10-likelihood that a
//! read was generated by a candidate haplotype.
//!
//! The recursion runs in the linear domain, scaled by a large constant to
//! keep long products representable, and accumulates for every grid cell
//! the total probability of all partial alignments of the read prefix
//! against the haplotype prefix ending in the Match, Insert or Delete
//! state. The result is the log10 of the terminal-row Match and Insert
//! mass, minus the scale.

use crate::pairhmm::quals::ReadErrorModel;
use crate::types::ReadRecord;

/// Floor sentinel returned for degenerate inputs and underflowed sums.
///
/// Finite, far below any real score, and below the accelerator trust
/// threshold so floored values are always recomputed when they surface
/// through the accelerated path.
pub const LIKELIHOOD_FLOOR: f64 = -1.0e5;

/// Forward-algorithm kernel with per-read table and matrix caching.
///
/// Matrices are retained between calls so that evaluating the same read
/// against a haplotype sharing a prefix with the previous one can resume
/// from the first differing column (`hap_start`). The read-derived tables
/// are rebuilt only when `recache` is true; they depend on the read alone,
/// never the haplotype.
#[derive(Debug, Default)]
pub struct ForwardKernel {
    match_m: Vec<f64>,
    insert_m: Vec<f64>,
    delete_m: Vec<f64>,
    /// Row stride of the flattened matrices (max haplotype length + 1).
    stride: usize,
    /// Number of allocated rows (max read length + 1).
    rows: usize,
    model: ReadErrorModel,
    /// Haplotype length of the previous call; bounds column reuse.
    last_hap_len: usize,
}

impl ForwardKernel {
    /// Create a kernel with no preallocated capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a kernel sized for the given maximum read and haplotype
    /// lengths, avoiding reallocation on the hot path.
    pub fn with_capacity(max_read_len: usize, max_hap_len: usize) -> Self {
        let mut kernel = Self::new();
        kernel.ensure_capacity(max_read_len, max_hap_len);
        kernel
    }

    /// Log10-likelihood of `read` against `hap_bases`.
    ///
    /// `recache` must be true the first time a read is evaluated; it may be
    /// false for subsequent haplotypes of the same read, in which case the
    /// cached read tables are reused. `hap_start` is the first position at
    /// which `hap_bases` differs from the previous call's haplotype; grid
    /// columns up to it are reused verbatim. `recache = true` forces a full
    /// evaluation from column zero.
    ///
    /// Never fails: degenerate inputs and underflowed sums yield
    /// [`LIKELIHOOD_FLOOR`].
    pub fn likelihood(
        &mut self,
        hap_bases: &[u8],
        read: &ReadRecord,
        hap_start: usize,
        recache: bool,
    ) -> f64 {
        let read_len = read.len();
        let hap_len = hap_bases.len();
        if read_len == 0 || hap_len == 0 {
            return LIKELIHOOD_FLOOR;
        }

        let mut start = hap_start;
        if recache || self.model.len() != read_len {
            self.model = ReadErrorModel::derive(read);
            start = 0;
        }
        if self.ensure_capacity(read_len, hap_len) {
            start = 0;
        }
        // Reused columns carry the start-row seed forward, and the seed
        // depends on the haplotype length; a length change invalidates them.
        if hap_len != self.last_hap_len {
            start = 0;
        }
        self.last_hap_len = hap_len;

        // Linear-domain scale keeping products of thousands of per-base
        // probabilities representable; subtracted from the final log10.
        let scale = 2f64.powi(1020);
        let scale_log10 = scale.log10();

        // Start mass is spread over the Delete row so the read may begin
        // aligning at any haplotype offset, normalized over the number of
        // windows that fit the whole read.
        let windows = hap_len.saturating_sub(read_len) + 1;
        let seed = scale / windows as f64;
        let row0 = 0;
        for j in 0..=hap_len {
            self.match_m[row0 + j] = 0.0;
            self.insert_m[row0 + j] = 0.0;
            self.delete_m[row0 + j] = seed;
        }

        for i in 1..=read_len {
            let row = i * self.stride;
            let prev = (i - 1) * self.stride;
            let read_base = read.bases[i - 1];
            let mc = self.model.match_continue[i - 1];
            let g2m = self.model.gap_to_match[i - 1];
            let ins_open = self.model.ins_open[i - 1];
            let del_open = self.model.del_open[i - 1];
            let gap_extend = self.model.gap_extend[i - 1];
            let p_match = self.model.base_match[i - 1];
            let p_mismatch = self.model.base_mismatch[i - 1];

            for j in (start + 1)..=hap_len {
                let hap_base = hap_bases[j - 1];
                let agrees = read_base == hap_base || read_base == b'N' || hap_base == b'N';
                let prior = if agrees { p_match } else { p_mismatch };

                self.match_m[row + j] = prior
                    * (self.match_m[prev + j - 1] * mc
                        + (self.insert_m[prev + j - 1] + self.delete_m[prev + j - 1]) * g2m);
                self.insert_m[row + j] =
                    self.match_m[prev + j] * ins_open + self.insert_m[prev + j] * gap_extend;
                self.delete_m[row + j] =
                    self.match_m[row + j - 1] * del_open + self.delete_m[row + j - 1] * gap_extend;
            }
        }

        let final_row = read_len * self.stride;
        let mut sum = 0.0;
        for j in 1..=hap_len {
            sum += self.match_m[final_row + j] + self.insert_m[final_row + j];
        }

        let result = sum.log10() - scale_log10;
        if !result.is_finite() || result < LIKELIHOOD_FLOOR {
            return LIKELIHOOD_FLOOR;
        }
        result.min(0.0)
    }

    /// Grow the matrices if needed. Returns true when existing cell values
    /// were invalidated by a reallocation.
    fn ensure_capacity(&mut self, read_len: usize, hap_len: usize) -> bool {
        let want_stride = hap_len + 1;
        let want_rows = read_len + 1;
        if want_stride <= self.stride && want_rows <= self.rows {
            return false;
        }
        let stride = want_stride.max(self.stride);
        let rows = want_rows.max(self.rows);
        let cells = stride * rows;
        self.match_m = vec![0.0; cells];
        self.insert_m = vec![0.0; cells];
        self.delete_m = vec![0.0; cells];
        self.stride = stride;
        self.rows = rows;
        self.last_hap_len = 0;
        true
    }
}

/// First position at which two haplotypes differ; the shorter length when
/// one is a prefix of the other. Feeds the kernel's `hap_start` window
/// for callers that evaluate one read against presorted haplotypes
/// sharing prefixes; the batch dispatcher always evaluates from column
/// zero.
pub fn first_differing_position(a: &[u8], b: &[u8]) -> usize {
    let limit = a.len().min(b.len());
    for i in 0..limit {
        if a[i] != b[i] {
            return i;
        }
    }
    limit
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ANCHOR_QUAL: u8 = 100;

    fn anchored_read(bases: &[u8], base_qual: u8) -> ReadRecord {
        // Massive indel and gap qualities pin the alignment to the match
        // diagonal so closed-form expectations hold.
        ReadRecord::with_quals(
            bases.to_vec(),
            base_qual,
            ANCHOR_QUAL,
            ANCHOR_QUAL,
            ANCHOR_QUAL,
        )
    }

    #[test]
    fn perfect_match_equals_product_of_base_probabilities() {
        let read = anchored_read(b"AAAA", 30);
        let mut kernel = ForwardKernel::new();
        let got = kernel.likelihood(b"AAAA", &read, 0, true);
        let expected = 4.0 * 0.999f64.log10();
        assert_relative_eq!(got, expected, epsilon = 1e-3);
    }

    #[test]
    fn single_mismatch_pays_one_error_probability() {
        let read = anchored_read(b"AAAA", 30);
        let mut kernel = ForwardKernel::new();
        let got = kernel.likelihood(b"AATA", &read, 0, true);
        let expected = 3.0 * 0.999f64.log10() + 1e-3f64.log10();
        assert_relative_eq!(got, expected, epsilon = 1e-3);
    }

    #[test]
    fn mismatch_in_every_position() {
        let hap = b"TTCTCTTCTGTTGTGGCTGGTT";
        let match_qual = 90;
        let mismatch_qual = 20;
        let mut kernel = ForwardKernel::new();

        for k in 0..hap.len() {
            let mut bases = hap.to_vec();
            bases[k] = if bases[k] == b'C' { b'T' } else { b'C' };
            let mut quals = vec![match_qual; hap.len()];
            quals[k] = mismatch_qual;
            let read = ReadRecord::new(
                bases,
                quals,
                vec![ANCHOR_QUAL; hap.len()],
                vec![ANCHOR_QUAL; hap.len()],
                vec![ANCHOR_QUAL; hap.len()],
            )
            .unwrap();

            let got = kernel.likelihood(hap, &read, 0, true);
            let expected = ((hap.len() - 1) as f64)
                * crate::pairhmm::qual_to_prob(match_qual).log10()
                + crate::pairhmm::qual_to_error_prob(mismatch_qual).log10();
            assert_relative_eq!(got, expected, epsilon = 1e-2);
        }
    }

    #[test]
    fn n_bases_never_count_as_mismatches() {
        let read = anchored_read(b"ANAA", 30);
        let mut kernel = ForwardKernel::new();
        let got = kernel.likelihood(b"AAAA", &read, 0, true);
        let also = kernel.likelihood(b"ANAA", &anchored_read(b"AAAA", 30), 0, true);
        assert_relative_eq!(got, also, epsilon = 1e-9);
        assert_relative_eq!(got, 4.0 * 0.999f64.log10(), epsilon = 1e-3);
    }

    #[test]
    fn empty_inputs_yield_the_floor() {
        let read = anchored_read(b"ACGT", 30);
        let empty = anchored_read(b"", 30);
        let mut kernel = ForwardKernel::new();
        assert_eq!(kernel.likelihood(b"", &read, 0, true), LIKELIHOOD_FLOOR);
        assert_eq!(kernel.likelihood(b"ACGT", &empty, 0, true), LIKELIHOOD_FLOOR);
    }

    #[test]
    fn output_is_non_positive_and_finite() {
        let read = ReadRecord::with_quals(b"ACGTACGTAC".to_vec(), 30, 45, 40, 10);
        let mut kernel = ForwardKernel::new();
        for hap in [
            b"ACGTACGTACGTACGTACGT".as_slice(),
            b"TTTTTTTTTT".as_slice(),
            b"ACGT".as_slice(),
        ] {
            let v = kernel.likelihood(hap, &read, 0, true);
            assert!(v <= 0.0 && v.is_finite(), "bad likelihood {v}");
        }
    }

    #[test]
    fn shared_prefix_window_matches_full_evaluation() {
        let read = ReadRecord::with_quals(b"ACGTGTCACACTGGATT".to_vec(), 30, 45, 40, 10);
        let hap_1 = b"ACGTGTCAAACCGGGTTGGTCA";
        let hap_2 = b"ACGTGTCACACTGGGTTGGTCA";

        let mut cached = ForwardKernel::new();
        cached.likelihood(hap_1, &read, 0, true);
        let start = first_differing_position(hap_1, hap_2);
        let windowed = cached.likelihood(hap_2, &read, start, false);

        let mut fresh = ForwardKernel::new();
        let full = fresh.likelihood(hap_2, &read, 0, true);
        assert_relative_eq!(windowed, full, epsilon = 1e-9);
    }

    #[test]
    fn recache_discipline_is_transparent() {
        let read = ReadRecord::with_quals(b"ACGTACGT".to_vec(), 30, 45, 40, 10);
        let haps: [&[u8]; 3] = [b"ACGTACGTAA", b"ACGTTCGTAA", b"TTGTACGTAA"];

        let mut cached = ForwardKernel::new();
        let with_cache: Vec<f64> = haps
            .iter()
            .enumerate()
            .map(|(j, hap)| cached.likelihood(hap, &read, 0, j == 0))
            .collect();

        let mut always = ForwardKernel::new();
        let without_cache: Vec<f64> = haps
            .iter()
            .map(|hap| always.likelihood(hap, &read, 0, true))
            .collect();

        assert_eq!(with_cache, without_cache);
    }

    #[test]
    fn first_differing_position_handles_prefixes() {
        assert_eq!(first_differing_position(b"ACGT", b"ACTT"), 2);
        assert_eq!(first_differing_position(b"ACGT", b"ACGTAA"), 4);
        assert_eq!(first_differing_position(b"ACGT", b"ACGT"), 4);
        assert_eq!(first_differing_position(b"", b"ACGT"), 0);
    }
}
