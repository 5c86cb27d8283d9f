//! Discrete Gaussian noise sampling for LWE instance generation.
//!
//! The original implementation drives its noise (`chi` in
//! `lwe_instance.c`) from a hand-rolled nonlinear-feedback generator
//! (`random_utils.c`). Nothing in the spec requires bit-exact interop with
//! that generator — only that each run be reproducible from a seed — so
//! this crate draws noise from `rand`/`rand_distr` the way the teacher
//! repo draws its own randomness (`rand::rngs::SmallRng` in
//! `whitebox-tools-app/src/tools/math_stat_analysis/random_sample.rs`)
//! rather than transliterating the NLFSR.

use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Draws one continuous Gaussian sample with standard deviation `sigma`,
/// rounds to the nearest integer (round-half-away-from-zero), matching the
/// `chi` sampler's use as an integer error term.
pub fn chi<R: Rng + ?Sized>(rng: &mut R, sigma: f64) -> i64 {
    let normal = Normal::new(0.0, sigma).expect("sigma must be finite and positive");
    let sample: f64 = normal.sample(rng);
    sample.round() as i64
}

/// Draws a noise value already reduced into `[0, q)`, as stored directly in
/// `Sample::error`.
pub fn noise_mod_q<R: Rng + ?Sized>(rng: &mut R, sigma: f64, q: u32) -> u16 {
    let e = chi(rng, sigma);
    e.rem_euclid(q as i64) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn noise_mod_q_is_always_in_range() {
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..1000 {
            let n = noise_mod_q(&mut rng, 3.0, 101);
            assert!((n as u32) < 101);
        }
    }

    #[test]
    fn same_seed_reproduces_the_same_noise_sequence() {
        let mut a = SmallRng::seed_from_u64(7);
        let mut b = SmallRng::seed_from_u64(7);
        let seq_a: Vec<u16> = (0..50).map(|_| noise_mod_q(&mut a, 2.5, 97)).collect();
        let seq_b: Vec<u16> = (0..50).map(|_| noise_mod_q(&mut b, 2.5, 97)).collect();
        assert_eq!(seq_a, seq_b);
    }
}
