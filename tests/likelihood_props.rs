use proptest::prelude::*;

use readlik::device::mock::MockAccelerator;
use readlik::{
    EngineConfig, Haplotype, LikelihoodEngine, ReadRecord, LIKELIHOOD_FLOOR,
};

fn base() -> impl Strategy<Value = u8> {
    prop_oneof![Just(b'A'), Just(b'C'), Just(b'G'), Just(b'T'), Just(b'N')]
}

fn read_strategy() -> impl Strategy<Value = ReadRecord> {
    (
        proptest::collection::vec(base(), 1..24),
        10u8..=40,
        30u8..=45,
        30u8..=45,
        5u8..=20,
    )
        .prop_map(|(bases, bq, iq, dq, gq)| ReadRecord::with_quals(bases, bq, iq, dq, gq))
}

fn haplotype_strategy(min_len: usize) -> impl Strategy<Value = Vec<Haplotype>> {
    proptest::collection::vec(
        proptest::collection::vec(base(), min_len..min_len + 16),
        1..5,
    )
    .prop_map(|seqs| {
        seqs.into_iter()
            .enumerate()
            .map(|(j, bases)| Haplotype::new(format!("hap{j}"), bases))
            .collect()
    })
}

proptest! {
    #[test]
    fn scores_are_finite_nonpositive_and_floored(
        (read, haplotypes) in read_strategy()
            .prop_flat_map(|r| {
                let len = r.len();
                (Just(r), haplotype_strategy(len))
            })
    ) {
        let mut engine = LikelihoodEngine::software_only();
        let reads = [read];
        let map = engine.compute_likelihoods(&reads, &haplotypes).expect("compute succeeds");

        prop_assert_eq!(map.num_reads(), 1);
        let row = map.row(0).expect("row exists");
        prop_assert_eq!(row.len(), haplotypes.len());
        for (allele, score) in row {
            prop_assert!(score.is_finite(), "{} score {} not finite", allele, score);
            prop_assert!(*score <= 0.0, "{} score {} above zero", allele, score);
            prop_assert!(*score >= LIKELIHOOD_FLOOR, "{} score {} below floor", allele, score);
        }
    }

    #[test]
    fn accelerated_path_is_bit_identical_to_software(
        (read, haplotypes) in read_strategy()
            .prop_flat_map(|r| {
                let len = r.len();
                (Just(r), haplotype_strategy(len))
            }),
        queue_depth in 1usize..8,
    ) {
        let reads = [read];

        let mut software = LikelihoodEngine::software_only();
        let expected = software.compute_likelihoods(&reads, &haplotypes).expect("compute succeeds");

        let mut accelerated = LikelihoodEngine::with_device(
            Box::new(MockAccelerator::new(queue_depth)),
            EngineConfig::default(),
        )
        .expect("engine constructs");
        let got = accelerated.compute_likelihoods(&reads, &haplotypes).expect("compute succeeds");

        prop_assert_eq!(got, expected);
    }
}
