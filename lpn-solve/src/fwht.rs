//! FWHT solver: binary peak-finding over `Z_2^k`, plus a soft-information
//! variant and a threaded brute-force hybrid for a handful of additional
//! non-binary positions.
//!
//! Grounded on `original_source/src/solve_fwht.c`: the in-place
//! Walsh-Hadamard butterfly (`FWHT`), the bias table built from a wrapped
//! discrete Gaussian PMF (`initialize_bias_table`, `BOUND = 101`,
//! including its exact accounting quirk — `even` is seeded with
//! `normal_pdf(y,0,sigma)` before the loop, and the loop's own `j = 0` term
//! adds `2 * normal_pdf(y,0,sigma)` to it again), and the threaded
//! brute-force hybrid (`solve_fwht_search_bruteforce`) that partitions the
//! outer loop's first coordinate across worker threads, each with its own
//! tally buffer, merging into one mutex-guarded best peak.

use std::sync::Mutex;

use statrs::distribution::{Continuous, Normal};

use lpn_core::error::{PipelineError, Result};
use lpn_core::sample::Sample;

/// Largest `fwhtPositions` this implementation will allocate a tally for
/// (`2^25` `f64`s is already 256 MiB).
pub const MAX_FWHT_POSITIONS: usize = 25;

/// Fast in-place Walsh-Hadamard transform, ported from the original's
/// `FWHT`: `size` must be a power of two.
fn fwht_inplace(data: &mut [f64]) {
    let size = data.len();
    let mut step = 1usize;
    while step < size {
        let mut j = 0usize;
        while j < size {
            for k in 0..step {
                let a = j + k;
                let b = j + k + step;
                let tmp = data[a];
                data[a] = tmp + data[b];
                data[b] = tmp - data[b];
            }
            j += step * 2;
        }
        step *= 2;
    }
}

/// `a = v <= q/2 ? v : |v - q|`, bit = `a mod 2` — the original's
/// `sample_to_int` element transform, used for both the FWHT window's
/// position bits and (applied to `sum_with_error`) the tally sign.
fn centered_parity(v: i16, q: u32) -> u8 {
    let v = v.rem_euclid(q as i16) as i32;
    let qi = q as i32;
    let a = if v <= qi / 2 { v } else { (v - qi).abs() };
    (a % 2) as u8
}

fn window_bits(sample: &Sample, zero_positions: usize, fwht_positions: usize, q: u32) -> usize {
    let mut x = 0usize;
    for k in 0..fwht_positions {
        if centered_parity(sample.a[zero_positions + k], q) == 1 {
            x |= 1 << k;
        }
    }
    x
}

fn int_to_bin(mut input: usize, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    for bit in out.iter_mut().take(len) {
        *bit = (input & 1) as u8;
        input >>= 1;
    }
    out
}

fn check_fwht_positions(fwht_positions: usize) -> Result<()> {
    if fwht_positions == 0 || fwht_positions > MAX_FWHT_POSITIONS {
        return Err(PipelineError::UnsupportedConfiguration(format!(
            "fwht_positions must be in 1..={MAX_FWHT_POSITIONS}, got {fwht_positions}"
        )));
    }
    Ok(())
}

/// Scalar FWHT solve (spec section 4.12): `samples` are already mod-2
/// projected (`q = 2`), so `a[zero_positions..]` and `sum_with_error` are
/// themselves bits — no centering needed.
pub fn solve_fwht(samples: &[Sample], zero_positions: usize, fwht_positions: usize) -> Result<Vec<u8>> {
    check_fwht_positions(fwht_positions)?;
    let size = 1usize << fwht_positions;
    let mut list = vec![0f64; size];
    for sample in samples {
        let mut x = 0usize;
        for k in 0..fwht_positions {
            if sample.a[zero_positions + k] != 0 {
                x |= 1 << k;
            }
        }
        if sample.sum_with_error == 0 {
            list[x] += 1.0;
        } else {
            list[x] -= 1.0;
        }
    }
    fwht_inplace(&mut list);
    let (max_pos, _) = argmax_abs(&list);
    Ok(int_to_bin(max_pos, fwht_positions))
}

/// Wrapped discrete Gaussian confidence table: `bias[z]` is `2*P(even) - 1`
/// for the centered residue `z - (q-1)/2`, i.e. how strongly that residue
/// favors an even (bit 0) vs. odd (bit 1) representative once the `Z`
/// distribution is folded mod `q`.
fn bias_table(q: u32, sigma: f64) -> Vec<f64> {
    const BOUND: i64 = 101;
    let normal = Normal::new(0.0, sigma).expect("sigma must be finite and positive");
    let qf = q as f64;
    let half = ((q as i64 - 1) / 2) as f64;
    (0..q)
        .map(|z| {
            let y = z as f64 - half;
            let mut even = normal.pdf(y);
            let mut odd = 0.0;
            for j in 0..BOUND {
                let contribution = normal.pdf(y + j as f64 * qf) + normal.pdf(y - j as f64 * qf);
                if j % 2 != 0 {
                    odd += contribution;
                } else {
                    even += contribution;
                }
            }
            let total = even + odd;
            2.0 * (even / total) - 1.0
        })
        .collect()
}

fn argmax_abs(list: &[f64]) -> (usize, f64) {
    list.iter()
        .enumerate()
        .map(|(i, &v)| (i, v.abs()))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .expect("tally is non-empty")
}

/// Soft-information FWHT solve: like [`solve_fwht`], but weights each
/// sample's tally vote by [`bias_table`] instead of a flat ±1, and reads
/// directly from an un-projected (general `q`) store — the weight depends
/// on how far `sum_with_error` sits from the nearest odd/even residue, a
/// distinction the mod-2 projection already throws away.
pub fn solve_fwht_soft(
    samples: &[Sample],
    q: u32,
    sigma: f64,
    zero_positions: usize,
    fwht_positions: usize,
) -> Result<Vec<u8>> {
    check_fwht_positions(fwht_positions)?;
    let bias = bias_table(q, sigma);
    let half = (q as i32 - 1) / 2;
    let size = 1usize << fwht_positions;
    let mut list = vec![0f64; size];
    for sample in samples {
        let x = window_bits(sample, zero_positions, fwht_positions, q);
        let z = if sample.sum_with_error as i32 > half {
            sample.sum_with_error as i32 - q as i32
        } else {
            sample.sum_with_error as i32
        };
        let lsb = z.rem_euclid(2);
        let weight = bias[(z + half) as usize];
        if lsb == 0 {
            list[x] += weight;
        } else {
            list[x] -= weight;
        }
    }
    fwht_inplace(&mut list);
    let (max_pos, _) = argmax_abs(&list);
    Ok(int_to_bin(max_pos, fwht_positions))
}

/// Result of [`solve_fwht_bruteforce`]: the guessed small-signed block
/// (positions `[zero_positions+fwht_positions, ..)`) and the FWHT-decoded
/// bits (positions `[zero_positions, zero_positions+fwht_positions)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FwhtBruteForceSolution {
    pub brute_force_part: Vec<i16>,
    pub binary_part: Vec<u8>,
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

fn solve_fwht_pass(
    samples: &[Sample],
    zero_positions: usize,
    fwht_positions: usize,
    q: u32,
    bf_start: usize,
    guess: &[i16],
) -> (usize, f64) {
    let size = 1usize << fwht_positions;
    let mut list = vec![0f64; size];
    for sample in samples {
        let x = window_bits(sample, zero_positions, fwht_positions, q);
        let mut adjusted = sample.sum_with_error as i64;
        for (j, &g) in guess.iter().enumerate() {
            adjusted -= sample.a[bf_start + j] as i64 * g as i64;
        }
        let adjusted = adjusted.rem_euclid(q as i64) as i16;
        if centered_parity(adjusted, q) == 0 {
            list[x] += 1.0;
        } else {
            list[x] -= 1.0;
        }
    }
    fwht_inplace(&mut list);
    argmax_abs(&list)
}

fn split_into_bands(candidates: &[i16], num_threads: usize) -> Vec<Vec<i16>> {
    let num_threads = num_threads.max(1);
    let chunk_size = ((candidates.len() + num_threads - 1) / num_threads).max(1);
    candidates.chunks(chunk_size).map(|c| c.to_vec()).collect()
}

/// Threaded brute-force + FWHT hybrid (spec section 4.12): guesses
/// `bf_positions` coordinates immediately after the FWHT window, each over
/// `[-ratio, ratio]` with `ratio = round(2*alpha*q)`, splitting the first
/// guessed coordinate's range across `num_threads` workers. `samples` are
/// raw (general `q`), not mod-2 projected, since the guessed coordinates
/// need their true magnitude to subtract from `sum_with_error`.
pub fn solve_fwht_bruteforce(
    samples: &[Sample],
    q: u32,
    alpha: f64,
    zero_positions: usize,
    bf_positions: usize,
    fwht_positions: usize,
    num_threads: usize,
) -> Result<FwhtBruteForceSolution> {
    check_fwht_positions(fwht_positions)?;
    let bf_start = zero_positions + fwht_positions;

    if bf_positions == 0 {
        let (pos, _) = solve_fwht_pass(samples, zero_positions, fwht_positions, q, bf_start, &[]);
        return Ok(FwhtBruteForceSolution {
            brute_force_part: Vec::new(),
            binary_part: int_to_bin(pos, fwht_positions),
        });
    }

    let ratio = (2.0 * alpha * q as f64).round().max(0.0) as i64;
    let candidates: Vec<i16> = (-ratio..=ratio).map(|v| v as i16).collect();
    let rest_candidates = cartesian_product(&candidates, bf_positions - 1);
    let bands = split_into_bands(&candidates, num_threads);

    let best: Mutex<Option<(Vec<i16>, usize, f64)>> = Mutex::new(None);
    std::thread::scope(|scope| {
        for band in &bands {
            let rest_candidates = &rest_candidates;
            let best = &best;
            scope.spawn(move || {
                for &first in band {
                    for rest in rest_candidates {
                        let mut guess = Vec::with_capacity(bf_positions);
                        guess.push(first);
                        guess.extend_from_slice(rest);
                        let (pos, peak) = solve_fwht_pass(samples, zero_positions, fwht_positions, q, bf_start, &guess);
                        let mut slot = best.lock().expect("best-peak mutex is never poisoned");
                        if slot.as_ref().map_or(true, |(_, _, best_peak)| peak > *best_peak) {
                            *slot = Some((guess, pos, peak));
                        }
                    }
                }
            });
        }
    });

    let (guess, pos, _) = best
        .into_inner()
        .expect("best-peak mutex is never poisoned")
        .expect("candidate range is non-empty");
    Ok(FwhtBruteForceSolution {
        brute_force_part: guess,
        binary_part: int_to_bin(pos, fwht_positions),
    })
}
