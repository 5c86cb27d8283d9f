//! FFT solver: spectral peak-finding over `Z_q` for the last few still-
//! unknown coordinates of a reduced sample store.
//!
//! Grounded on `original_source/src/solve_fft.c`'s `processOneCategory` /
//! `calculateFft1d`/`2d`/`3d` / `updateSolution1d`: accumulate a complex
//! exponential per sample into a `q^fftPositions`-sized buffer indexed by
//! the target coordinates, forward-transform it, and take the argmax of
//! the real part. The original calls out to FFTW for the transform; this
//! crate has no FFTW binding in its dependency stack, so `rustfft` (1-D
//! only) drives a small separable multi-dimensional transform instead —
//! see `fft_nd_inplace` below.

use std::f64::consts::PI;
use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

use lpn_core::error::{PipelineError, Result};
use lpn_core::sample::Sample;

/// Runs a forward DFT of length `q` along every one of `d` axes of a
/// row-major `q^d`-sized cube, in place. `rustfft` only transforms
/// contiguous 1-D buffers, so each axis pass gathers its `q` samples into
/// a scratch buffer, transforms, and scatters them back — the same
/// gather/transform/scatter shape `calculateFft2d`/`3d` uses when it loops
/// the 1-D case over rows then columns.
fn fft_nd_inplace(data: &mut [Complex64], q: usize, d: usize, fft: &Arc<dyn Fft<f64>>) {
    let total = data.len();
    debug_assert_eq!(total, q.pow(d as u32));
    let mut scratch = vec![Complex64::new(0.0, 0.0); q];
    for axis in 0..d {
        let stride = q.pow((d - 1 - axis) as u32);
        let block = stride * q;
        let num_blocks = total / block;
        for block_idx in 0..num_blocks {
            let base = block_idx * block;
            for inner in 0..stride {
                for t in 0..q {
                    scratch[t] = data[base + inner + t * stride];
                }
                fft.process(&mut scratch);
                for t in 0..q {
                    data[base + inner + t * stride] = scratch[t];
                }
            }
        }
    }
}

fn lexicographic_index(sample: &Sample, start_index: usize, fft_positions: usize, q: usize) -> usize {
    let mut idx = 0usize;
    for k in 0..fft_positions {
        idx = idx * q + sample.a[start_index + k] as usize;
    }
    idx
}

/// `solvedSum = sum_{j >= start_index+fftPositions} a_j * solution[j] mod q`
/// where `solution[j]` for `j` in that range is `already_solved[j - (start_index+fftPositions)]`.
fn solved_sum(sample: &Sample, start_index: usize, fft_positions: usize, already_solved: &[i16], q: i64) -> i64 {
    let mut acc: i64 = 0;
    for (k, &s) in already_solved.iter().enumerate() {
        let j = start_index + fft_positions + k;
        acc += sample.a[j] as i64 * s as i64;
    }
    acc.rem_euclid(q)
}

/// Runs the FFT solve, returning both the recovered `fftPositions`-tuple
/// and the peak's real-part score (used by [`solve_fft_hybrid`] to compare
/// guesses).
fn solve_fft_with_score(
    samples: &[Sample],
    n: usize,
    q: u32,
    already_solved: &[i16],
    fft_positions: usize,
) -> Result<(Vec<i16>, f64)> {
    if fft_positions == 0 || fft_positions > 3 {
        return Err(PipelineError::UnsupportedConfiguration(format!(
            "fft_positions must be in 1..=3, got {fft_positions}"
        )));
    }
    let start_index = n
        .checked_sub(already_solved.len() + fft_positions)
        .ok_or_else(|| {
            PipelineError::UnsupportedConfiguration(
                "already_solved.len() + fft_positions exceeds n".to_string(),
            )
        })?;

    let qu = q as usize;
    let qi = q as i64;
    let size = qu
        .checked_pow(fft_positions as u32)
        .ok_or_else(|| PipelineError::Allocation("fft buffer size overflowed usize".to_string()))?;
    let mut buf = vec![Complex64::new(0.0, 0.0); size];

    for sample in samples {
        let sum = solved_sum(sample, start_index, fft_positions, already_solved, qi);
        let r = (sample.sum_with_error as i64 - sum).rem_euclid(qi);
        let idx = lexicographic_index(sample, start_index, fft_positions, qu);
        let theta = 2.0 * PI * r as f64 / q as f64;
        buf[idx] += Complex64::new(theta.cos(), theta.sin());
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(qu);
    fft_nd_inplace(&mut buf, qu, fft_positions, &fft);

    let (best_idx, best) = buf
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.re.partial_cmp(&b.1.re).unwrap())
        .expect("buffer is non-empty for fft_positions >= 1");

    let mut out = vec![0i16; fft_positions];
    let mut flat = best_idx;
    for k in (0..fft_positions).rev() {
        out[k] = (flat % qu) as i16;
        flat /= qu;
    }
    Ok((out, best.re))
}

/// Plain FFT solve (spec section 4.11): recovers the `fftPositions`
/// coordinates at `[n - already_solved.len() - fftPositions, ..)`.
/// `already_solved` holds the already-recovered suffix, most-significant
/// (earliest index) coordinate first.
pub fn solve_fft(samples: &[Sample], n: usize, q: u32, already_solved: &[i16], fft_positions: usize) -> Result<Vec<i16>> {
    solve_fft_with_score(samples, n, q, already_solved, fft_positions).map(|(pos, _)| pos)
}

/// Result of [`solve_fft_hybrid`]: the brute-forced block, immediately
/// followed by the FFT-recovered block, reading left to right in the same
/// order they sit in the secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HybridFftSolution {
    pub brute_force_part: Vec<i16>,
    pub fft_part: Vec<i16>,
}

fn cartesian_product(candidates: &[i16], width: usize) -> Vec<Vec<i16>> {
    if width == 0 {
        return vec![Vec::new()];
    }
    let mut out = Vec::new();
    let rest = cartesian_product(candidates, width - 1);
    for &c in candidates {
        for tail in &rest {
            let mut guess = Vec::with_capacity(width);
            guess.push(c);
            guess.extend_from_slice(tail);
            out.push(guess);
        }
    }
    out
}

/// Hybrid FFT solve (spec section 4.11): brute-forces `brute_force_positions`
/// coordinates immediately following the FFT block, each over the
/// symmetric interval `[-3*sigma, 3*sigma]` (`sigma = alpha*q`), keeping the
/// guess whose FFT peak is strongest. Per the spec's open question, a
/// degenerate (empty) interval collapses `brute_force_positions` to zero
/// rather than erroring.
pub fn solve_fft_hybrid(
    samples: &[Sample],
    n: usize,
    q: u32,
    alpha: f64,
    already_solved: &[i16],
    fft_positions: usize,
    brute_force_positions: usize,
) -> Result<HybridFftSolution> {
    let sigma = alpha * q as f64;
    let radius = (3.0 * sigma).ceil() as i64;
    let effective_bf_positions = if radius < 1 { 0 } else { brute_force_positions };

    if effective_bf_positions == 0 {
        let fft_part = solve_fft(samples, n, q, already_solved, fft_positions)?;
        return Ok(HybridFftSolution {
            brute_force_part: Vec::new(),
            fft_part,
        });
    }

    let candidates: Vec<i16> = (-radius..=radius)
        .map(|v| ((v.rem_euclid(q as i64)) as i16))
        .collect();

    let mut best: Option<(Vec<i16>, Vec<i16>, f64)> = None;
    for guess in cartesian_product(&candidates, effective_bf_positions) {
        let mut combined = guess.clone();
        combined.extend_from_slice(already_solved);
        let (fft_part, score) = solve_fft_with_score(samples, n, q, &combined, fft_positions)?;
        if best.as_ref().map_or(true, |(_, _, best_score)| score > *best_score) {
            best = Some((fft_part, guess, score));
        }
    }
    let (fft_part, brute_force_part, _) = best.expect("candidate range is non-empty when radius >= 0");
    Ok(HybridFftSolution { brute_force_part, fft_part })
}
