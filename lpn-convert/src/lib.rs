//! Adapter between an external LWE challenge text file and this
//! workspace's unsorted sample stores (spec section 6, "external
//! interfaces").
//!
//! Grounded on `original_source/src/storage_file_utilities.c`'s
//! `convertTUDarmstadtProblemInstanceToNativeFormat`: parse the header and
//! the bracketed `b`/`a` blocks ([`challenge`]), run the initial linear
//! transform over the first `n` independent samples, then optionally
//! amplify the remaining transformed samples into signed triples chosen
//! by a maximum-length LFSR recurrence ([`amplify`]).

pub mod amplify;
pub mod challenge;

use std::path::Path;

use rand::Rng;

use lpn_core::sample::Sample;
use lpn_core::transform::InitialTransform;
use lpn_core::transition::write_unsorted_store;

pub use challenge::{ConvertError, Result};

/// End-to-end conversion: parse `src_path`, apply the initial linear
/// transform, optionally amplify, and write the result as a fresh
/// unsorted store at `dst_dir`.
///
/// Returns the instance's `(n, q, alpha)` and the seed-transformed
/// `InitialTransform` (the caller needs it to invert the final solve back
/// onto the original, untransformed secret).
pub fn convert_challenge_file<R: Rng + ?Sized>(
    src_path: &Path,
    dst_dir: &Path,
    amplify_to_total_samples: Option<u64>,
    rng: &mut R,
) -> Result<((usize, u32, f64), InitialTransform)> {
    let text = std::fs::read_to_string(src_path)
        .map_err(|e| ConvertError::Io { path: src_path.to_path_buf(), source: e })?;
    let parsed = challenge::parse_challenge_file(&text)?;
    let samples = challenge::samples_from_challenge(&parsed);

    let (transform, seed_indices) =
        InitialTransform::build(&samples, parsed.n, parsed.q).map_err(ConvertError::Pipeline)?;
    let seed_set: std::collections::HashSet<usize> = seed_indices.into_iter().collect();
    let remaining: Vec<Sample> = samples
        .iter()
        .enumerate()
        .filter(|(i, _)| !seed_set.contains(i))
        .map(|(_, s)| transform.transform_sample(s))
        .collect();

    let out_samples = match amplify_to_total_samples {
        Some(total) => amplify::amplify(&remaining, parsed.n, parsed.q, total, rng),
        None => remaining,
    };

    write_unsorted_store(dst_dir, parsed.n, parsed.q, parsed.alpha, &out_samples).map_err(ConvertError::Pipeline)?;
    Ok(((parsed.n, parsed.q, parsed.alpha), transform))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lpn_core::transition::read_unsorted_store;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn challenge_text(n: usize, q: u32, alpha: f64, s: &[i16]) -> String {
        let mut rng = SmallRng::seed_from_u64(42);
        let num_samples = 30usize;
        let mut a_rows = Vec::new();
        let mut b_vals = Vec::new();
        for _ in 0..num_samples {
            let row: Vec<i16> = (0..n).map(|_| rng.gen_range(0..q as i16)).collect();
            let dot: i64 = row.iter().zip(s.iter()).map(|(&a, &si)| a as i64 * si as i64).sum();
            b_vals.push((dot.rem_euclid(q as i64)) as i16);
            a_rows.push(row);
        }
        let b_str = b_vals.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ");
        let a_str = a_rows
            .iter()
            .map(|row| format!("[{}]", row.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ")))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{n}\n{num_samples}\n{q}\n{alpha}\n[{b_str}]\n[{a_str}]\n")
    }

    #[test]
    fn converts_a_challenge_file_into_a_readable_unsorted_store() {
        let q = 101u32;
        let n = 3usize;
        let secret = [10i16, 20i16, 30i16];
        let text = challenge_text(n, q, 0.01, &secret);

        let tmp = tempfile::tempdir().unwrap();
        let src_path = tmp.path().join("challenge.txt");
        std::fs::write(&src_path, text).unwrap();
        let dst_dir = tmp.path().join("unsorted");

        let mut rng = SmallRng::seed_from_u64(1);
        let ((out_n, out_q, _alpha), _transform) =
            convert_challenge_file(&src_path, &dst_dir, None, &mut rng).unwrap();
        assert_eq!(out_n, n);
        assert_eq!(out_q, q);

        let samples = read_unsorted_store(&dst_dir).unwrap();
        assert!(!samples.is_empty());
    }

    #[test]
    fn converts_with_amplification_to_a_requested_sample_count() {
        let q = 101u32;
        let n = 3usize;
        let secret = [1i16, 2i16, 3i16];
        let text = challenge_text(n, q, 0.01, &secret);

        let tmp = tempfile::tempdir().unwrap();
        let src_path = tmp.path().join("challenge.txt");
        std::fs::write(&src_path, text).unwrap();
        let dst_dir = tmp.path().join("unsorted");

        let mut rng = SmallRng::seed_from_u64(2);
        convert_challenge_file(&src_path, &dst_dir, Some(200), &mut rng).unwrap();

        let samples = read_unsorted_store(&dst_dir).unwrap();
        assert_eq!(samples.len(), 200);
    }
}
