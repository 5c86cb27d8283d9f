//! Sample amplification: stretches a modest seed corpus into however many
//! samples a BKW run needs by combining signed triples.
//!
//! Grounded on `original_source/src/storage_file_utilities.c`'s amplification
//! loop inside `convertTUDarmstadtProblemInstanceToNativeFormat`: indices
//! for each triplet are chosen by clocking a maximum-length LFSR (seeded
//! `ii=0, jj=0, kk=1`, recurrence `next = (1594*ii + 1600*jj + 1600*kk) mod
//! q`) until they land strictly increasing and in range, which spreads out
//! which samples get reused and keeps the all-zero-combination rate low;
//! the sign pattern for each triplet (`+++`, `++-`, `+-+`, `+--`) is drawn
//! uniformly at random.

use rand::Rng;

use lpn_core::arith::ModTables;
use lpn_core::sample::Sample;

/// `(a_ii <eps1> a_jj) <eps2> a_kk`, built from two applications of the
/// pairwise combination law the rest of this workspace already uses for
/// BKW steps.
fn combine_three(tables: &ModTables, n: usize, a: &Sample, b: &Sample, c: &Sample, eps1: i8, eps2: i8) -> Sample {
    let ab = Sample::combine(tables, n, a, b, 1, eps1);
    Sample::combine(tables, n, &ab, c, 1, eps2)
}

/// Clocks the LFSR from `(ii, jj, kk)` until the three indices are
/// distinct, strictly increasing, and within `num_remaining`, returning
/// the new `(ii, jj, kk)`.
fn next_triplet(mut ii: i64, mut jj: i64, mut kk: i64, q: i64, num_remaining: i64) -> (i64, i64, i64) {
    loop {
        let temp = (1594 * ii + 1600 * jj + 1600 * kk).rem_euclid(q);
        ii = jj;
        jj = kk;
        kk = temp;
        if ii < jj && jj < kk && ii < num_remaining && jj < num_remaining && kk < num_remaining {
            return (ii, jj, kk);
        }
    }
}

/// Amplifies `remaining` (already initial-transformed, seed rows removed)
/// up to `total_num_samples`, cycling the LFSR for as many triplets as
/// needed. `remaining` must hold at least 3 samples.
pub fn amplify<R: Rng + ?Sized>(remaining: &[Sample], n: usize, q: u32, total_num_samples: u64, rng: &mut R) -> Vec<Sample> {
    assert!(remaining.len() >= 3, "amplification needs at least 3 samples to form a triplet");
    let tables = ModTables::new(q);
    let num_remaining = remaining.len() as i64;

    let mut out = Vec::with_capacity(total_num_samples as usize);
    let (mut ii, mut jj, mut kk) = (0i64, 0i64, 1i64);
    while (out.len() as u64) < total_num_samples {
        let (next_ii, next_jj, next_kk) = next_triplet(ii, jj, kk, q as i64, num_remaining);
        ii = next_ii;
        jj = next_jj;
        kk = next_kk;

        let (eps1, eps2) = match rng.gen_range(0..4u8) {
            0 => (1i8, 1i8),
            1 => (1i8, -1i8),
            2 => (-1i8, 1i8),
            _ => (-1i8, -1i8),
        };
        let combined = combine_three(
            &tables,
            n,
            &remaining[ii as usize],
            &remaining[jj as usize],
            &remaining[kk as usize],
            eps1,
            eps2,
        );
        out.push(combined);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn sample_with(a: &[i16], q: u32) -> Sample {
        let mut s = Sample::default();
        for (i, &v) in a.iter().enumerate() {
            s.a[i] = v;
        }
        s.sum_with_error = a.iter().sum::<i16>().rem_euclid(q as i16);
        s.recompute_hash(a.len(), 0);
        s
    }

    #[test]
    fn amplify_reaches_the_requested_total() {
        let q = 101u32;
        let remaining: Vec<Sample> = (0..10).map(|i| sample_with(&[i, i * 2, i * 3], q)).collect();
        let mut rng = SmallRng::seed_from_u64(1);
        let out = amplify(&remaining, 3, q, 500, &mut rng);
        assert_eq!(out.len(), 500);
    }

    #[test]
    fn next_triplet_always_yields_strictly_increasing_in_range_indices() {
        let q = 101i64;
        let mut ii = 0i64;
        let mut jj = 0i64;
        let mut kk = 1i64;
        for _ in 0..200 {
            let (a, b, c) = next_triplet(ii, jj, kk, q, 10);
            assert!(a < b && b < c && c < 10);
            ii = a;
            jj = b;
            kk = c;
        }
    }
}
