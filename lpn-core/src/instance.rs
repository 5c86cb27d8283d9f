//! The LWE instance: dimension, modulus, noise rate, secret, and the
//! optional linear transformation that makes the secret look like noise.
//!
//! Grounded on `original_source/src/lwe_instance.c`: `lweInit` (secret
//! drawn from the same Gaussian as the noise term, "with implicit initial
//! transformation"), `lweInstanceAllocateLinearTransformationMatrices`
//! (lazy `A`/`A_inverse`/`b` allocation), and `newRandomSample` (per-sample
//! generation law).

use std::fs;
use std::path::Path;

use rand::Rng;

use crate::arith::ModTables;
use crate::error::{io_err, PipelineError, Result};
use crate::noise::chi;
use crate::sample::{Sample, MAX_N};

/// An LWE instance: public parameters plus the secret the pipeline is
/// trying to recover.
#[derive(Debug, Clone)]
pub struct LweInstance {
    pub n: usize,
    pub q: u32,
    pub alpha: f64,
    pub sigma: f64,
    /// Secret coordinates `s[0..n]`; `s[n..MAX_N]` is always zero.
    pub s: [i16; MAX_N],
    /// Forward linear transform applied to the secret, row-major `n x n`.
    /// `None` until [`LweInstance::allocate_linear_transform`] is called.
    pub a_matrix: Option<Vec<i16>>,
    pub a_inverse: Option<Vec<i16>>,
    pub b_vector: Option<Vec<i16>>,
    /// Carried PRNG context, see [`RandomContext`]. Always the default
    /// until a real use for it appears.
    pub rnd_ctx: RandomContext,
}

/// Writes `n`/`q`/`alpha` to `params.txt`, independent of any particular
/// secret — used by pipeline stages (e.g. [`crate::writer::StorageWriter`])
/// that carry an LWE instance's public parameters forward without holding
/// its secret. A reduction stage's store never has a secret or transform of
/// its own to write; [`LweInstance::write_params`] is the full format, used
/// only at the seed stage where the secret still exists.
pub fn write_params_fields(dir: &Path, n: usize, q: u32, alpha: f64) -> Result<()> {
    let path = dir.join("params.txt");
    let body = format!("n = {n}\nq = {q}\nalpha = {alpha:.17}\n");
    fs::write(&path, body).map_err(|e| io_err(&path, e))
}

/// Carried mirror of the original's `rnd_ctx` PRNG state
/// (`A1,A2,B1,B2,C1,C2,initialized`), written to and read from `params.txt`
/// for file-format completeness. This crate draws samples from
/// [`rand::Rng`] rather than a bespoke generator, so these fields are never
/// consulted during generation — they round-trip through disk and nothing
/// else. Grounded on `original_source/src/storage_file_utilities.c`'s
/// `rnd_ctx = (%llu,%llu,%llu,%llu,%llu,%llu,%d)` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RandomContext {
    pub a1: u64,
    pub a2: u64,
    pub b1: u64,
    pub b2: u64,
    pub c1: u64,
    pub c2: u64,
    pub initialized: bool,
}

fn parse_paren_list(value: &str, path: &Path) -> Result<Vec<String>> {
    let inner = value
        .trim()
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .ok_or_else(|| PipelineError::BadParameters {
            path: path.to_path_buf(),
            reason: format!("{value:?} is not a parenthesized list"),
        })?;
    Ok(inner.split(',').map(str::trim).map(str::to_string).collect())
}

fn parse_i16_list(value: &str, path: &Path) -> Result<Vec<i16>> {
    parse_paren_list(value, path)?
        .iter()
        .map(|v| {
            v.parse::<i16>().map_err(|_| PipelineError::BadParameters {
                path: path.to_path_buf(),
                reason: format!("{v:?} is not a valid i16"),
            })
        })
        .collect()
}

fn parse_rnd_ctx(value: &str, path: &Path) -> Result<RandomContext> {
    let fields = parse_paren_list(value, path)?;
    let bad = || PipelineError::BadParameters {
        path: path.to_path_buf(),
        reason: format!("rnd_ctx = {value} does not have 7 fields"),
    };
    if fields.len() != 7 {
        return Err(bad());
    }
    let parse_u64 = |s: &str| s.parse::<u64>().map_err(|_| bad());
    Ok(RandomContext {
        a1: parse_u64(&fields[0])?,
        a2: parse_u64(&fields[1])?,
        b1: parse_u64(&fields[2])?,
        b2: parse_u64(&fields[3])?,
        c1: parse_u64(&fields[4])?,
        c2: parse_u64(&fields[5])?,
        initialized: fields[6] != "0",
    })
}

fn read_matrix_block<'a, I: Iterator<Item = &'a str>>(lines: &mut I, n: usize, path: &Path) -> Result<Vec<i16>> {
    let mut flat = Vec::with_capacity(n * n);
    for _ in 0..n {
        let line = lines.next().ok_or_else(|| PipelineError::BadParameters {
            path: path.to_path_buf(),
            reason: "transform matrix block ended early".to_string(),
        })?;
        let row: Vec<i16> = line
            .split_whitespace()
            .map(|v| {
                v.parse::<i16>().map_err(|_| PipelineError::BadParameters {
                    path: path.to_path_buf(),
                    reason: format!("{v:?} is not a valid i16"),
                })
            })
            .collect::<Result<_>>()?;
        if row.len() != n {
            return Err(PipelineError::BadParameters {
                path: path.to_path_buf(),
                reason: format!("matrix row has {} entries, expected {n}", row.len()),
            });
        }
        flat.extend(row);
    }
    Ok(flat)
}

impl LweInstance {
    /// Draws `n <= MAX_N` secret coordinates from the same Gaussian used
    /// for sample noise, matching the original's "implicit initial
    /// transformation" comment: post-transform, `s` is statistically
    /// indistinguishable from error terms.
    pub fn generate<R: Rng + ?Sized>(n: usize, q: u32, alpha: f64, rng: &mut R) -> LweInstance {
        assert!(n <= MAX_N, "n exceeds MAX_N");
        let sigma = alpha * q as f64;
        let mut s = [0i16; MAX_N];
        for i in 0..n {
            let v = chi(rng, sigma).rem_euclid(q as i64);
            s[i] = v as i16;
        }
        LweInstance {
            n,
            q,
            alpha,
            sigma,
            s,
            a_matrix: None,
            a_inverse: None,
            b_vector: None,
            rnd_ctx: RandomContext::default(),
        }
    }

    /// Lazily allocates the `A`/`A_inverse`/`b` linear-transform state,
    /// leaving any already-allocated piece untouched.
    pub fn allocate_linear_transform(&mut self) {
        if self.a_matrix.is_none() {
            self.a_matrix = Some(vec![0i16; self.n * self.n]);
        }
        if self.a_inverse.is_none() {
            self.a_inverse = Some(vec![0i16; self.n * self.n]);
        }
        if self.b_vector.is_none() {
            self.b_vector = Some(vec![0i16; self.n]);
        }
    }

    pub fn a(&self, i: usize, j: usize) -> i16 {
        self.a_matrix.as_ref().expect("A not allocated")[i * self.n + j]
    }

    pub fn a_inv(&self, i: usize, j: usize) -> i16 {
        self.a_inverse.as_ref().expect("A_inverse not allocated")[i * self.n + j]
    }

    /// Draws one fresh random sample `(a, b = <a,s> + e mod q)`.
    pub fn random_sample<R: Rng + ?Sized>(&self, rng: &mut R, tables: &ModTables) -> Sample {
        let mut sample = Sample::default();
        let mut sum: u32 = 0;
        for i in 0..self.n {
            let ai = rng.gen_range(0..self.q) as i16;
            sample.a[i] = ai;
            sum = tables.sum(sum as u16, ((ai as u32 * self.s[i] as u32) % self.q) as u16) as u32;
        }
        let err = chi(rng, self.sigma).rem_euclid(self.q as i64) as u16;
        sample.error = err as i16;
        sample.sum_with_error = tables.sum(sum as u16, err) as i16;
        sample.recompute_hash(self.n, 0);
        sample
    }

    /// Serializes the full instance — public parameters, carried PRNG
    /// context, the secret, and (if allocated) the linear transform — to
    /// `params.txt`, spec section 6's single-file format. A store produced
    /// by a reduction step has no secret of its own and uses
    /// [`write_params_fields`] instead; this is the seed stage's writer,
    /// where the secret still exists and needs to survive the process.
    pub fn write_params(&self, dir: &Path) -> Result<()> {
        let path = dir.join("params.txt");
        let s = self.s[..self.n].iter().map(i16::to_string).collect::<Vec<_>>().join(",");
        let mut body = format!(
            "n = {}\nq = {}\nalpha = {:.17}\nsigma = {:.17}\nrnd_ctx = ({},{},{},{},{},{},{})\ns = ({s})\n",
            self.n,
            self.q,
            self.alpha,
            self.sigma,
            self.rnd_ctx.a1,
            self.rnd_ctx.a2,
            self.rnd_ctx.b1,
            self.rnd_ctx.b2,
            self.rnd_ctx.c1,
            self.rnd_ctx.c2,
            self.rnd_ctx.initialized as u8,
        );
        if let (Some(a), Some(a_inv), Some(b)) = (&self.a_matrix, &self.a_inverse, &self.b_vector) {
            body += "A =\n";
            for row in a.chunks(self.n) {
                let line = row.iter().map(i16::to_string).collect::<Vec<_>>().join(" ");
                body.push_str(&line);
                body.push('\n');
            }
            body += "A_inverse =\n";
            for row in a_inv.chunks(self.n) {
                let line = row.iter().map(i16::to_string).collect::<Vec<_>>().join(" ");
                body.push_str(&line);
                body.push('\n');
            }
            let b_line = b.iter().map(i16::to_string).collect::<Vec<_>>().join(",");
            body += &format!("b = ({b_line})\n");
        }
        fs::write(&path, body).map_err(|e| io_err(&path, e))
    }

    /// Reads back everything [`LweInstance::write_params`] wrote, including
    /// the secret and, if present, the linear transform. A minimal
    /// `n`/`q`/`alpha`-only `params.txt` (as written by
    /// [`write_params_fields`] for a reduction stage) is not valid input
    /// here — this reconstructs a *problem instance*, not a stage's public
    /// parameters.
    pub fn read_params(dir: &Path) -> Result<LweInstance> {
        let path = dir.join("params.txt");
        let text = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let bad = |reason: String| PipelineError::BadParameters { path: path.clone(), reason };

        let mut n = None;
        let mut q = None;
        let mut alpha = None;
        let mut sigma = None;
        let mut rnd_ctx = None;
        let mut s_vec = None;

        let mut lines = text.lines().peekable();
        while let Some(&raw) = lines.peek() {
            let line = raw.trim();
            if line.is_empty() {
                lines.next();
                continue;
            }
            if line == "A =" {
                break;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| bad(format!("line {line:?} is not key=value")))?;
            match key.trim() {
                "n" => n = Some(value.trim().parse::<usize>().map_err(|_| bad(format!("bad n {value:?}")))?),
                "q" => q = Some(value.trim().parse::<u32>().map_err(|_| bad(format!("bad q {value:?}")))?),
                "alpha" => alpha = Some(value.trim().parse::<f64>().map_err(|_| bad(format!("bad alpha {value:?}")))?),
                "sigma" => sigma = Some(value.trim().parse::<f64>().map_err(|_| bad(format!("bad sigma {value:?}")))?),
                "rnd_ctx" => rnd_ctx = Some(parse_rnd_ctx(value, &path)?),
                "s" => s_vec = Some(parse_i16_list(value, &path)?),
                other => return Err(bad(format!("unexpected key {other:?} in params.txt"))),
            }
            lines.next();
        }

        let n = n.ok_or_else(|| bad("missing n".to_string()))?;
        let q = q.ok_or_else(|| bad("missing q".to_string()))?;
        let alpha = alpha.ok_or_else(|| bad("missing alpha".to_string()))?;
        let sigma = sigma.ok_or_else(|| bad("missing sigma".to_string()))?;
        let rnd_ctx = rnd_ctx.ok_or_else(|| bad("missing rnd_ctx".to_string()))?;
        let s_vec = s_vec.ok_or_else(|| bad("missing s".to_string()))?;
        if s_vec.len() != n {
            return Err(bad(format!("s has {} entries, expected {n}", s_vec.len())));
        }
        let mut s = [0i16; MAX_N];
        s[..n].copy_from_slice(&s_vec);

        let mut instance = LweInstance {
            n,
            q,
            alpha,
            sigma,
            s,
            a_matrix: None,
            a_inverse: None,
            b_vector: None,
            rnd_ctx,
        };

        if let Some(&raw) = lines.peek() {
            if raw.trim() == "A =" {
                lines.next();
                let a_matrix = read_matrix_block(&mut lines, n, &path)?;
                let header = lines.next().ok_or_else(|| bad("missing A_inverse header".to_string()))?;
                if header.trim() != "A_inverse =" {
                    return Err(bad(format!("expected 'A_inverse =', got {header:?}")));
                }
                let a_inverse = read_matrix_block(&mut lines, n, &path)?;
                let b_line = lines.next().ok_or_else(|| bad("missing b".to_string()))?;
                let (b_key, b_value) = b_line
                    .trim()
                    .split_once('=')
                    .ok_or_else(|| bad(format!("line {b_line:?} is not key=value")))?;
                if b_key.trim() != "b" {
                    return Err(bad(format!("expected 'b =', got {b_key:?}")));
                }
                let b_vector = parse_i16_list(b_value, &path)?;
                if b_vector.len() != n {
                    return Err(bad(format!("b has {} entries, expected {n}", b_vector.len())));
                }
                instance.a_matrix = Some(a_matrix);
                instance.a_inverse = Some(a_inverse);
                instance.b_vector = Some(b_vector);
            }
        }

        Ok(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn generated_secret_coordinates_are_reduced_mod_q() {
        let mut rng = SmallRng::seed_from_u64(1);
        let instance = LweInstance::generate(8, 101, 0.01, &mut rng);
        for i in 0..8 {
            assert!(instance.s[i] >= 0 && (instance.s[i] as u32) < 101);
        }
        for i in 8..MAX_N {
            assert_eq!(instance.s[i], 0);
        }
    }

    #[test]
    fn random_sample_satisfies_the_sum_with_error_relation() {
        let mut rng = SmallRng::seed_from_u64(2);
        let q = 97u32;
        let instance = LweInstance::generate(6, q, 0.01, &mut rng);
        let tables = ModTables::new(q);
        let sample = instance.random_sample(&mut rng, &tables);
        let dot: i64 = (0..6)
            .map(|i| sample.a[i] as i64 * instance.s[i] as i64)
            .sum();
        let expected = (dot + sample.error as i64).rem_euclid(q as i64);
        assert_eq!(sample.sum_with_error as i64, expected);
    }

    #[test]
    fn allocate_linear_transform_is_idempotent() {
        let mut rng = SmallRng::seed_from_u64(3);
        let mut instance = LweInstance::generate(4, 101, 0.01, &mut rng);
        instance.allocate_linear_transform();
        let ptr_before = instance.a_matrix.as_ref().unwrap().as_ptr();
        instance.allocate_linear_transform();
        let ptr_after = instance.a_matrix.as_ref().unwrap().as_ptr();
        assert_eq!(ptr_before, ptr_after);
    }

    #[test]
    fn params_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = SmallRng::seed_from_u64(4);
        let instance = LweInstance::generate(10, 101, 0.0125, &mut rng);
        instance.write_params(dir.path()).unwrap();
        let read_back = LweInstance::read_params(dir.path()).unwrap();
        assert_eq!(read_back.n, 10);
        assert_eq!(read_back.q, 101);
        assert!((read_back.alpha - 0.0125).abs() < 1e-12);
        assert!((read_back.sigma - instance.sigma).abs() < 1e-12);
        assert_eq!(&read_back.s[..10], &instance.s[..10]);
        assert_eq!(read_back.rnd_ctx, instance.rnd_ctx);
        assert!(read_back.a_matrix.is_none());
    }

    #[test]
    fn params_with_a_carried_rnd_ctx_round_trips_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = SmallRng::seed_from_u64(41);
        let mut instance = LweInstance::generate(5, 97, 0.01, &mut rng);
        instance.rnd_ctx = RandomContext {
            a1: 11,
            a2: 22,
            b1: 33,
            b2: 44,
            c1: 55,
            c2: 66,
            initialized: true,
        };
        instance.write_params(dir.path()).unwrap();
        let read_back = LweInstance::read_params(dir.path()).unwrap();
        assert_eq!(read_back.rnd_ctx, instance.rnd_ctx);
    }

    #[test]
    fn params_with_a_linear_transform_round_trip_the_transform_too() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        let mut instance = LweInstance::generate(3, 97, 0.01, &mut rng);
        instance.allocate_linear_transform();
        {
            let a = instance.a_matrix.as_mut().unwrap();
            for (i, v) in a.iter_mut().enumerate() {
                *v = i as i16;
            }
        }
        {
            let a_inv = instance.a_inverse.as_mut().unwrap();
            for (i, v) in a_inv.iter_mut().enumerate() {
                *v = (i as i16) * 2;
            }
        }
        {
            let b = instance.b_vector.as_mut().unwrap();
            for (i, v) in b.iter_mut().enumerate() {
                *v = (i as i16) + 7;
            }
        }
        instance.write_params(dir.path()).unwrap();
        let read_back = LweInstance::read_params(dir.path()).unwrap();
        assert_eq!(read_back.a_matrix, instance.a_matrix);
        assert_eq!(read_back.a_inverse, instance.a_inverse);
        assert_eq!(read_back.b_vector, instance.b_vector);
    }

    #[test]
    fn write_params_fields_stays_minimal_for_stageless_stores() {
        let dir = tempfile::tempdir().unwrap();
        write_params_fields(dir.path(), 6, 101, 0.02).unwrap();
        let text = fs::read_to_string(dir.path().join("params.txt")).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().next().unwrap().starts_with("n = 6"));
        assert!(!text.contains("sigma"));
        assert!(!text.contains("rnd_ctx"));
    }
}
