//! Modular linear algebra over `Z_q`: matrix inversion and a search for a
//! linearly independent set of row vectors, both needed to build the
//! initial linear transform (spec section 4, "initial transform").
//!
//! No file in the retrievable original source actually performs these
//! computations — `lweInstanceAllocateLinearTransformationMatrices` only
//! allocates `A`/`A_inverse`/`b`, and `transform_secret.c` only consumes
//! them once built. This module is written directly from the spec's
//! description (Gaussian elimination mod `q`, matrix inversion mod `q`);
//! see `DESIGN.md` for the note.

use crate::error::{PipelineError, Result};

/// Modular inverse of `a` mod `m` via the extended Euclidean algorithm.
/// `None` if `gcd(a, m) != 1`.
pub fn mod_inverse(a: i64, m: i64) -> Option<i64> {
    let (mut old_r, mut r) = (a.rem_euclid(m), m);
    let (mut old_s, mut s) = (1i64, 0i64);
    while r != 0 {
        let quotient = old_r / r;
        let (new_r, new_s) = (old_r - quotient * r, old_s - quotient * s);
        old_r = r;
        r = new_r;
        old_s = s;
        s = new_s;
    }
    if old_r != 1 {
        None
    } else {
        Some(old_s.rem_euclid(m))
    }
}

/// Inverts an `n x n` row-major matrix mod `q` via Gauss-Jordan elimination
/// on the matrix augmented with the identity. `q` must be prime (or at
/// least every pivot encountered must be invertible mod `q`).
pub fn invert_matrix_mod_q(matrix: &[i16], n: usize, q: u32) -> Result<Vec<i16>> {
    let qi = q as i64;
    let mut aug = vec![0i64; n * 2 * n];
    for i in 0..n {
        for j in 0..n {
            aug[i * 2 * n + j] = matrix[i * n + j] as i64 % qi;
        }
        aug[i * 2 * n + n + i] = 1;
    }

    for col in 0..n {
        let pivot_row = (col..n).find(|&r| aug[r * 2 * n + col] % qi != 0);
        let pivot_row = pivot_row.ok_or(PipelineError::SingularSeedMatrix { needed: n, found: col })?;
        if pivot_row != col {
            for k in 0..2 * n {
                aug.swap(col * 2 * n + k, pivot_row * 2 * n + k);
            }
        }
        let pivot = aug[col * 2 * n + col].rem_euclid(qi);
        let inv = mod_inverse(pivot, qi).ok_or(PipelineError::SingularSeedMatrix { needed: n, found: col })?;
        for k in 0..2 * n {
            aug[col * 2 * n + k] = (aug[col * 2 * n + k] * inv).rem_euclid(qi);
        }
        for r in 0..n {
            if r == col {
                continue;
            }
            let factor = aug[r * 2 * n + col].rem_euclid(qi);
            if factor == 0 {
                continue;
            }
            for k in 0..2 * n {
                aug[r * 2 * n + k] = (aug[r * 2 * n + k] - factor * aug[col * 2 * n + k]).rem_euclid(qi);
            }
        }
    }

    let mut inverse = vec![0i16; n * n];
    for i in 0..n {
        for j in 0..n {
            inverse[i * n + j] = aug[i * 2 * n + n + j] as i16;
        }
    }
    Ok(inverse)
}

/// Multiplies a row-major `n x n` matrix (mod `q`) by a length-`n` vector.
pub fn mat_vec_mul_mod_q(matrix: &[i16], n: usize, vec: &[i16], q: u32) -> Vec<i16> {
    let qi = q as i64;
    (0..n)
        .map(|i| {
            let sum: i64 = (0..n).map(|j| matrix[i * n + j] as i64 * vec[j] as i64).sum();
            sum.rem_euclid(qi) as i16
        })
        .collect()
}

/// Greedily selects up to `n` rows from `candidates` (each of length `n`)
/// that are linearly independent mod `q`, via incremental Gaussian
/// elimination. Returns the indices of the chosen rows, in the order they
/// were accepted. Errors if fewer than `n` independent rows are found.
pub fn find_independent_rows(candidates: &[Vec<i16>], n: usize, q: u32) -> Result<Vec<usize>> {
    let qi = q as i64;
    let mut basis: Vec<Vec<i64>> = Vec::with_capacity(n);
    let mut pivots: Vec<usize> = Vec::with_capacity(n);
    let mut chosen = Vec::with_capacity(n);

    for (idx, row) in candidates.iter().enumerate() {
        if basis.len() == n {
            break;
        }
        let mut reduced: Vec<i64> = row.iter().map(|&v| v as i64 % qi).collect();
        for (b, &piv) in basis.iter().zip(pivots.iter()) {
            if reduced[piv] != 0 {
                let factor = reduced[piv];
                for k in 0..n {
                    reduced[k] = (reduced[k] - factor * b[k]).rem_euclid(qi);
                }
            }
        }
        if let Some(piv) = (0..n).find(|&k| reduced[k] != 0) {
            let inv = mod_inverse(reduced[piv], qi).expect("pivot entry must be invertible when q is prime");
            for k in 0..n {
                reduced[k] = (reduced[k] * inv).rem_euclid(qi);
            }
            basis.push(reduced);
            pivots.push(piv);
            chosen.push(idx);
        }
    }

    if chosen.len() < n {
        return Err(PipelineError::SingularSeedMatrix {
            needed: n,
            found: chosen.len(),
        });
    }
    Ok(chosen)
}
