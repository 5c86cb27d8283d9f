//! Initial linear transform: picks `n` linearly independent samples as a
//! seed basis and uses them to re-express every other sample against a
//! secret that is, by construction, distributed like the noise.
//!
//! `transform_secret`/`inverse_transform_secret` are a direct port of
//! `original_source/src/transform_secret.c`. The seed selection and the
//! per-sample transform law are not present anywhere in the retrievable
//! original source (only matrix allocation and the secret-only transform
//! are) — both are derived here from the relation that file does define:
//! with `A` the matrix of seed `a`-vectors and `b` their `sum_with_error`
//! values, `newS = A s - b (mod q)` equals `-e_seed (mod q)` for the seed
//! rows, which is exactly the "looks like noise" property the spec asks
//! for. Propagating that same substitution to a non-seed sample
//! `(a, b = <a,s>+e)` gives `newA = (A^-1)^T a` and
//! `newB = b - <a, A^-1 b> (mod q)`, so that `newB = <newA, newS> + e`
//! still holds. See `DESIGN.md` for this derivation.

use crate::arith::ModTables;
use crate::error::Result;
use crate::linalg::{find_independent_rows, invert_matrix_mod_q, mat_vec_mul_mod_q};
use crate::sample::Sample;

pub struct InitialTransform {
    pub n: usize,
    pub q: u32,
    /// Row-major `n x n`: row `i` is the `a`-vector of seed sample `i`.
    pub a_matrix: Vec<i16>,
    pub a_inverse: Vec<i16>,
    /// `sum_with_error` of each seed sample.
    pub b_vector: Vec<i16>,
    /// `A^-1 * b (mod q)`, cached so per-sample transforms don't recompute it.
    a_inv_b: Vec<i16>,
}

impl InitialTransform {
    /// Scans `samples` in order, keeping the first `n` whose `a`-vectors
    /// are linearly independent mod `q`, and builds the transform from
    /// them. Returns the indices (into `samples`) consumed as the seed, so
    /// the caller can exclude them from the samples it re-expresses.
    pub fn build(samples: &[Sample], n: usize, q: u32) -> Result<(InitialTransform, Vec<usize>)> {
        let rows: Vec<Vec<i16>> = samples.iter().map(|s| s.a[..n].to_vec()).collect();
        let seed_indices = find_independent_rows(&rows, n, q)?;

        let mut a_matrix = vec![0i16; n * n];
        let mut b_vector = vec![0i16; n];
        for (row, &idx) in seed_indices.iter().enumerate() {
            for col in 0..n {
                a_matrix[row * n + col] = samples[idx].a[col];
            }
            b_vector[row] = samples[idx].sum_with_error;
        }
        let a_inverse = invert_matrix_mod_q(&a_matrix, n, q)?;
        let a_inv_b = mat_vec_mul_mod_q(&a_inverse, n, &b_vector, q);

        Ok((
            InitialTransform {
                n,
                q,
                a_matrix,
                a_inverse,
                b_vector,
                a_inv_b,
            },
            seed_indices,
        ))
    }

    /// `s -> A s - b (mod q)`, ported from `transformSecret`.
    pub fn transform_secret(&self, s: &[i16]) -> Vec<i16> {
        let as_ = mat_vec_mul_mod_q(&self.a_matrix, self.n, s, self.q);
        as_.iter()
            .zip(self.b_vector.iter())
            .map(|(&v, &b)| (self.q as i32 + v as i32 - b as i32).rem_euclid(self.q as i32) as i16)
            .collect()
    }

    /// `s -> A^-1 (s + b) (mod q)`, ported from `inverseTransformSecret`.
    pub fn inverse_transform_secret(&self, s: &[i16]) -> Vec<i16> {
        let t: Vec<i16> = s
            .iter()
            .zip(self.b_vector.iter())
            .map(|(&v, &b)| ((v as i32 + b as i32).rem_euclid(self.q as i32)) as i16)
            .collect();
        mat_vec_mul_mod_q(&self.a_inverse, self.n, &t, self.q)
    }

    /// Re-expresses one non-seed sample `(a, b = <a,s>+e)` against the
    /// transformed secret, preserving its error term untouched.
    ///
    /// `new_a = (A^-1)^T a`: row `i` of the transpose is column `i` of
    /// `A^-1`, so `new_a[i] = sum_j A_inverse[j][i] * a[j]`.
    pub fn transform_sample(&self, sample: &Sample) -> Sample {
        let qi = self.q as i64;
        let mut out = *sample;

        for i in 0..self.n {
            let sum: i64 = (0..self.n)
                .map(|j| self.a_inverse[j * self.n + i] as i64 * sample.a[j] as i64)
                .sum();
            out.a[i] = sum.rem_euclid(qi) as i16;
        }

        let dot_a_inv_b: i64 = (0..self.n).map(|j| sample.a[j] as i64 * self.a_inv_b[j] as i64).sum();
        out.sum_with_error = (sample.sum_with_error as i64 - dot_a_inv_b).rem_euclid(qi) as i16;
        out.recompute_hash(self.n, 0);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::LweInstance;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn seed_secret_transforms_to_the_negated_error() {
        let q = 101u32;
        let mut rng = SmallRng::seed_from_u64(5);
        let instance = LweInstance::generate(4, q, 0.01, &mut rng);
        let tables = ModTables::new(q);

        let mut samples = Vec::new();
        while samples.len() < 20 {
            samples.push(instance.random_sample(&mut rng, &tables));
        }
        let (transform, seed_indices) = InitialTransform::build(&samples, 4, q).unwrap();

        let new_s = transform.transform_secret(&instance.s[..4]);
        for (row, &idx) in seed_indices.iter().enumerate() {
            let expected = (q as i32 - samples[idx].error as i32).rem_euclid(q as i32) as i16;
            assert_eq!(new_s[row], expected);
        }
    }

    #[test]
    fn transform_then_inverse_transform_recovers_the_secret() {
        let q = 101u32;
        let mut rng = SmallRng::seed_from_u64(6);
        let instance = LweInstance::generate(4, q, 0.01, &mut rng);
        let tables = ModTables::new(q);
        let mut samples = Vec::new();
        while samples.len() < 20 {
            samples.push(instance.random_sample(&mut rng, &tables));
        }
        let (transform, _) = InitialTransform::build(&samples, 4, q).unwrap();
        let new_s = transform.transform_secret(&instance.s[..4]);
        let recovered = transform.inverse_transform_secret(&new_s);
        assert_eq!(&recovered[..], &instance.s[..4]);
    }

    #[test]
    fn transformed_non_seed_sample_is_still_consistent_with_the_new_secret() {
        let q = 101u32;
        let mut rng = SmallRng::seed_from_u64(7);
        let instance = LweInstance::generate(4, q, 0.01, &mut rng);
        let tables = ModTables::new(q);
        let mut samples = Vec::new();
        while samples.len() < 20 {
            samples.push(instance.random_sample(&mut rng, &tables));
        }
        let (transform, seed_indices) = InitialTransform::build(&samples, 4, q).unwrap();
        let new_s = transform.transform_secret(&instance.s[..4]);

        let non_seed_idx = (0..samples.len()).find(|i| !seed_indices.contains(i)).unwrap();
        let transformed = transform.transform_sample(&samples[non_seed_idx]);

        let dot: i64 = (0..4).map(|i| transformed.a[i] as i64 * new_s[i] as i64).sum();
        let expected = (dot + transformed.error as i64).rem_euclid(q as i64);
        assert_eq!(transformed.sum_with_error as i64, expected);
    }
}
