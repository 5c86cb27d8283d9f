//! Spec section 8 scenario D: smoothLMS combination under LF2 across three
//! blocks, then the brute-force + FWHT hybrid over a single non-binary
//! position. Scaled down from the literal `n=10, q=101` schedule for test
//! runtime — `n=8, q=41, p=13, p1=17`.
//!
//! `meta_skipped` is requested by the scaled-down spec schedule and is set
//! here to `1` on every smoothLMS step for completeness, but per the
//! `meta_skipped`/`prev_p1` gap recorded in `DESIGN.md`, nothing in
//! `category::position_values_to_category_index` or `transition`'s reader
//! consults those fields yet — they round-trip without affecting category
//! construction. This test therefore exercises smoothLMS's real payload
//! (the `p1`-scaled boundary digit, [`SortingMode::SmoothLms`]) under LF2,
//! not genuine combination-time meta-skip deferral; same "LMS only bounds
//! the residual" reasoning as `scenario_c.rs` applies, so every smoothLMS
//! exercise pass gets the same plainBKW finishing pass before the block is
//! treated as exactly zero.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use lpn_core::arith::ModTables;
use lpn_core::category::{BkwStepParameters, SortingMode};
use lpn_core::instance::LweInstance;
use lpn_core::transition::{
    read_unsorted_store, run_bkw_step, run_final_step, sort_unsorted_into_store, write_unsorted_store, Selection,
};
use lpn_solve::fwht::solve_fwht_bruteforce;

const N: usize = 8;
const Q: u32 = 41;
const P: u32 = 13;
const P1: u32 = 17;
const CAP: u64 = 200;
const MIN_FLUSH: f64 = 25.0;
const EARLY_ABORT: f64 = 99.0;

fn smooth_lms(start: usize) -> BkwStepParameters {
    BkwStepParameters {
        sorting_mode: SortingMode::SmoothLms { p1: P1 },
        start_position: start,
        num_positions: 2,
        q: Q,
        p: P,
        meta_skipped: 1,
        prev_p1: P1,
    }
}

fn plain_bkw(start: usize) -> BkwStepParameters {
    BkwStepParameters { sorting_mode: SortingMode::PlainBkw, start_position: start, num_positions: 2, q: Q, p: Q, meta_skipped: 0, prev_p1: Q }
}

#[test]
fn smooth_lms_three_block_schedule_then_bruteforce_fwht_recovers_the_tail() {
    let mut rng = SmallRng::seed_from_u64(0xD0000);
    let mut s = [0i16; lpn_core::sample::MAX_N];
    s[..N].copy_from_slice(&[5, 12, 30, 9, 18, 7, 1, 4]);
    let instance = LweInstance { n: N, q: Q, alpha: 0.0, sigma: 0.0, s, a_matrix: None, a_inverse: None, b_vector: None, rnd_ctx: Default::default() };
    let tables = ModTables::new(Q);
    let samples: Vec<_> = (0..8000).map(|_| instance.random_sample(&mut rng, &tables)).collect();

    let tmp = tempfile::tempdir().unwrap();
    let seed = tmp.path().join("seed");
    write_unsorted_store(&seed, N, Q, 0.0, &samples).unwrap();

    let lf2 = Selection::Lf2 { max_num_samples_per_category: Some(40) };

    let store0 = tmp.path().join("store0");
    sort_unsorted_into_store(&seed, &store0, N, Q, 0.0, smooth_lms(0), CAP, CAP, MIN_FLUSH).unwrap();

    let store1 = tmp.path().join("store1");
    run_bkw_step(&store0, &store1, N, Q, 0.0, plain_bkw(0), lf2, CAP, CAP, MIN_FLUSH, EARLY_ABORT, None).unwrap();
    let store2 = tmp.path().join("store2");
    run_bkw_step(&store1, &store2, N, Q, 0.0, smooth_lms(2), Selection::Lf1, CAP, CAP, MIN_FLUSH, EARLY_ABORT, None)
        .unwrap();

    let store3 = tmp.path().join("store3");
    run_bkw_step(&store2, &store3, N, Q, 0.0, plain_bkw(2), lf2, CAP, CAP, MIN_FLUSH, EARLY_ABORT, None).unwrap();
    let store4 = tmp.path().join("store4");
    run_bkw_step(&store3, &store4, N, Q, 0.0, smooth_lms(4), Selection::Lf1, CAP, CAP, MIN_FLUSH, EARLY_ABORT, None)
        .unwrap();

    let store5 = tmp.path().join("store5");
    run_bkw_step(&store4, &store5, N, Q, 0.0, plain_bkw(4), lf2, CAP, CAP, MIN_FLUSH, EARLY_ABORT, None).unwrap();

    let final_unsorted = tmp.path().join("final_unsorted");
    run_final_step(&store5, &final_unsorted, N, Q, 0.0, Selection::Lf1, CAP, CAP, MIN_FLUSH, EARLY_ABORT, None).unwrap();

    let final_samples = read_unsorted_store(&final_unsorted).unwrap();
    assert!(!final_samples.is_empty());
    for sample in &final_samples {
        for i in 0..6 {
            assert_eq!(sample.a[i], 0, "position {i} should be exactly cancelled after its plainBKW finishing pass");
        }
    }

    let result = solve_fwht_bruteforce(&final_samples, Q, 0.15, 6, 1, 1, 2).unwrap();
    assert_eq!(result.binary_part, vec![1], "fwht window should recover s[6]");
    assert_eq!(result.brute_force_part, vec![4], "brute force should recover s[7] directly");
}
