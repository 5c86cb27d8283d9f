//! The reduction pipeline's moving parts: sorting an unsorted seed store
//! into the first category-partitioned store, one BKW combination step,
//! the final (unsorted-output) step, and the mod-2 projection that hands
//! off to the FWHT solver.
//!
//! Grounded on `original_source/src/transition_bkw_step_plain_bkw_2_positions.c`
//! for the combination engine (`subtractSamples`/`addSamples`,
//! `processSingleCategoryLF1`/`LF2`, `processAdjacentCategoriesLF1`/`LF2`,
//! and the flush/early-abort driver loop) and
//! `original_source/src/transition_unsorted_2_sorted.c` for the initial
//! sort. `original_source` carries no `config_bkw.h`, so the
//! `MIN_FLUSH_LOAD`/`EARLY_ABORT_LOAD_LIMIT_PERCENTAGE` thresholds live in
//! [`crate::config::PipelineConfig`] instead of being baked-in constants —
//! see `DESIGN.md`.
//!
//! This crate also collapses the original's separate "unsorted store"
//! representation into a [`crate::category::BkwStepParameters`] with
//! `num_positions = 0` (`num_categories() == 1`, every sample routes to
//! category 0): one writer/reader implementation serves both sorted and
//! unsorted stores. Three-position plainBKW sub-bucketing and smoothLMS
//! meta-skipping (spec section 4.9, items 4-5) are pure memory-footprint
//! optimizations in the original, needed there because its category table
//! is built from a 2-position table plus a runtime third coordinate; this
//! crate's [`crate::category::BkwStepParameters::position_values_to_category_index`]
//! already folds every active position into the index directly, so the
//! general pairwise engine below produces the same destination categories
//! without a separate sub-bucketing fast path. Noted in `DESIGN.md`.

use crate::arith::ModTables;
use crate::category::BkwStepParameters;
use crate::error::{PipelineError, Result, StepStatus};
use crate::format::SampleReader as RawSampleReader;
use crate::reader::{CategoryPair, StorageReader};
use crate::sample::Sample;
use crate::store::Store;
use crate::writer::StorageWriter;

/// Which selection strategy a BKW step uses to combine an adjacent
/// category pair (spec section 4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// One reference sample against every other sample: linear-many
    /// combinations per pair.
    Lf1,
    /// All intra- and cross-category pairs, capped by
    /// `max_num_samples_per_category`: quadratic-many combinations.
    Lf2 { max_num_samples_per_category: Option<u64> },
}

/// Quality filter rejecting combinations whose squared norm, over a
/// trailing window of the combined `a`-vector, exceeds a threshold —
/// spec section 4.8's "unnatural selection". Applied to the combined
/// sample directly rather than the parents' window, a simplification
/// noted in `DESIGN.md`.
#[derive(Debug, Clone, Copy)]
pub struct UnnaturalSelection {
    pub start_index: usize,
    pub end_index: usize,
    pub threshold_ts: f64,
}

impl UnnaturalSelection {
    fn accepts(&self, n: u32, sample: &Sample, q: u32) -> bool {
        let qi = q as i32;
        let num_positions = (self.end_index - self.start_index) as f64;
        let sum_sq: i64 = (self.start_index..self.end_index.min(n as usize))
            .map(|i| {
                let v = sample.a[i] as i32;
                let centered = if v > qi / 2 { v - qi } else { v };
                (centered as i64) * (centered as i64)
            })
            .sum();
        (sum_sq as f64) <= num_positions * self.threshold_ts * self.threshold_ts
    }
}

/// Combines two parent samples with signs `eps1, eps2`, inserts the result
/// into `writer` at the category `dst_params` assigns it, and rolls the
/// insertion back (zero-column suppression) if the combined `a`-vector is
/// all zero or the unnatural-selection filter rejects it. Returns whether a
/// sample now lives in the writer.
#[allow(clippy::too_many_arguments)]
fn combine_and_insert(
    writer: &mut StorageWriter,
    dst_params: &BkwStepParameters,
    tables: &ModTables,
    n: usize,
    lhs: &Sample,
    rhs: &Sample,
    eps1: i8,
    eps2: i8,
    filter: Option<&UnnaturalSelection>,
) -> bool {
    let combined = Sample::combine(tables, n, lhs, rhs, eps1, eps2);
    if combined.is_zero_column(n) {
        return false;
    }
    if let Some(f) = filter {
        if !f.accepts(n as u32, &combined, dst_params.q) {
            return false;
        }
    }
    let start = dst_params.start_position;
    let end = start + dst_params.num_positions;
    let category = dst_params.position_values_to_category_index(&combined.a[start..end]);
    let status = writer.add_sample(category, combined);
    if status >= 2 {
        return false;
    }
    true
}

/// LF1 within one category (used for a singleton category with no
/// adjacent partner): one reference sample against every other.
fn process_lf1_single_category(
    writer: &mut StorageWriter,
    dst_params: &BkwStepParameters,
    tables: &ModTables,
    n: usize,
    filter: Option<&UnnaturalSelection>,
    cat: &[Sample],
) {
    if cat.is_empty() {
        return;
    }
    let reference = &cat[0];
    for other in &cat[1..] {
        combine_and_insert(writer, dst_params, tables, n, reference, other, 1, -1, filter);
    }
}

/// LF1 across an adjacent pair: reference against the rest of its own
/// category (subtraction), then against every sample of the partner
/// category (addition).
fn process_lf1_pair(
    writer: &mut StorageWriter,
    dst_params: &BkwStepParameters,
    tables: &ModTables,
    n: usize,
    filter: Option<&UnnaturalSelection>,
    cat_a: &[Sample],
    cat_b: &[Sample],
) {
    if cat_a.is_empty() {
        process_lf1_single_category(writer, dst_params, tables, n, filter, cat_b);
        return;
    }
    let reference = &cat_a[0];
    for other in &cat_a[1..] {
        combine_and_insert(writer, dst_params, tables, n, reference, other, 1, -1, filter);
    }
    for other in cat_b {
        combine_and_insert(writer, dst_params, tables, n, reference, other, 1, 1, filter);
    }
}

fn process_lf2_single_category(
    writer: &mut StorageWriter,
    dst_params: &BkwStepParameters,
    tables: &ModTables,
    n: usize,
    filter: Option<&UnnaturalSelection>,
    cat: &[Sample],
    max_per_category: Option<u64>,
) {
    let mut produced = 0u64;
    for i in 0..cat.len() {
        for j in (i + 1)..cat.len() {
            if let Some(max) = max_per_category {
                if produced >= max {
                    return;
                }
            }
            if combine_and_insert(writer, dst_params, tables, n, &cat[i], &cat[j], 1, -1, filter) {
                produced += 1;
            }
        }
    }
}

fn process_lf2_pair(
    writer: &mut StorageWriter,
    dst_params: &BkwStepParameters,
    tables: &ModTables,
    n: usize,
    filter: Option<&UnnaturalSelection>,
    cat_a: &[Sample],
    cat_b: &[Sample],
    max_per_category: Option<u64>,
) {
    let mut produced = 0u64;
    let under_cap = |produced: u64| match max_per_category {
        Some(max) => produced < max,
        None => true,
    };

    for i in 0..cat_a.len() {
        for j in (i + 1)..cat_a.len() {
            if !under_cap(produced) {
                return;
            }
            if combine_and_insert(writer, dst_params, tables, n, &cat_a[i], &cat_a[j], 1, -1, filter) {
                produced += 1;
            }
        }
    }
    for i in 0..cat_b.len() {
        for j in (i + 1)..cat_b.len() {
            if !under_cap(produced) {
                return;
            }
            if combine_and_insert(writer, dst_params, tables, n, &cat_b[i], &cat_b[j], 1, -1, filter) {
                produced += 1;
            }
        }
    }
    for a in cat_a {
        for b in cat_b {
            if !under_cap(produced) {
                return;
            }
            if combine_and_insert(writer, dst_params, tables, n, a, b, 1, 1, filter) {
                produced += 1;
            }
        }
    }
}

/// Runs one BKW reduction step: reads adjacent category pairs from the
/// store at `src_dir`, combines them per `selection`, and writes the
/// result sorted by `dst_params` into `dst_dir`. Returns
/// [`StepStatus::Skipped`] without touching `src_dir` if `dst_dir` already
/// exists (spec section 4.9, "failure semantics").
#[allow(clippy::too_many_arguments)]
pub fn run_bkw_step(
    src_dir: &std::path::Path,
    dst_dir: &std::path::Path,
    n: usize,
    q: u32,
    alpha: f64,
    dst_params: BkwStepParameters,
    selection: Selection,
    category_capacity_file: u64,
    category_capacity_buf: u64,
    min_flush_load_percent: f64,
    early_abort_load_percent: f64,
    filter: Option<UnnaturalSelection>,
) -> Result<StepStatus> {
    if dst_dir.exists() {
        return Ok(StepStatus::Skipped);
    }

    let mut reader = StorageReader::open(src_dir, MIN_READER_BUFFER_CATEGORIES)?;
    let mut writer = StorageWriter::create(
        dst_dir,
        n,
        q,
        alpha,
        dst_params,
        category_capacity_file,
        category_capacity_buf,
    )?;
    let tables = ModTables::new(q);

    loop {
        let load = writer.current_load_percentage_file();
        if load >= early_abort_load_percent {
            break;
        }
        match reader.next_adjacent_category_pair()? {
            CategoryPair::Exhausted => break,
            CategoryPair::Singleton(cat) => match selection {
                Selection::Lf1 => process_lf1_single_category(&mut writer, &dst_params, &tables, n, filter.as_ref(), &cat),
                Selection::Lf2 { max_num_samples_per_category } => process_lf2_single_category(
                    &mut writer,
                    &dst_params,
                    &tables,
                    n,
                    filter.as_ref(),
                    &cat,
                    max_num_samples_per_category,
                ),
            },
            CategoryPair::Pair(cat_a, cat_b) => match selection {
                Selection::Lf1 => process_lf1_pair(&mut writer, &dst_params, &tables, n, filter.as_ref(), &cat_a, &cat_b),
                Selection::Lf2 { max_num_samples_per_category } => process_lf2_pair(
                    &mut writer,
                    &dst_params,
                    &tables,
                    n,
                    filter.as_ref(),
                    &cat_a,
                    &cat_b,
                    max_num_samples_per_category,
                ),
            },
        }
        if writer.current_load_percentage_cache() >= min_flush_load_percent {
            writer.flush()?;
        }
    }
    writer.flush()?;
    Ok(StepStatus::Completed)
}

const MIN_READER_BUFFER_CATEGORIES: u64 = 8;

/// The single-category `BkwStepParameters` standing in for "unsorted"
/// (spec section 4.10's mod-2 output, and the final step's output).
fn unsorted_params(q: u32) -> BkwStepParameters {
    BkwStepParameters {
        sorting_mode: crate::category::SortingMode::PlainBkw,
        start_position: 0,
        num_positions: 0,
        q,
        p: q,
        meta_skipped: 0,
        prev_p1: q,
    }
}

/// The final step: same combination engine as [`run_bkw_step`], but the
/// destination has no further sorting — every combined sample lands in
/// the store's single category (spec section 4.9, "dispatch").
#[allow(clippy::too_many_arguments)]
pub fn run_final_step(
    src_dir: &std::path::Path,
    dst_dir: &std::path::Path,
    n: usize,
    q: u32,
    alpha: f64,
    selection: Selection,
    category_capacity_file: u64,
    category_capacity_buf: u64,
    min_flush_load_percent: f64,
    early_abort_load_percent: f64,
    filter: Option<UnnaturalSelection>,
) -> Result<StepStatus> {
    run_bkw_step(
        src_dir,
        dst_dir,
        n,
        q,
        alpha,
        unsorted_params(q),
        selection,
        category_capacity_file,
        category_capacity_buf,
        min_flush_load_percent,
        early_abort_load_percent,
        filter,
    )
}

/// Streams every sample out of a single-category ("unsorted") store —
/// the seed store, a final-step output, or a mod-2 projected store.
pub fn read_unsorted_store(dir: &std::path::Path) -> Result<Vec<Sample>> {
    let store = Store::open(dir)?;
    let info = store.read_info()?;
    let samples_path = store.samples_path();
    let file = std::fs::File::open(&samples_path).map_err(|e| crate::error::io_err(&samples_path, e))?;
    let mut reader = RawSampleReader::new(file);
    let mut out = Vec::with_capacity(info.total_num_samples_stored as usize);
    while let Some(s) = reader
        .read_sample()
        .map_err(|e| crate::error::io_err(&samples_path, e))?
    {
        out.push(s);
    }
    out.truncate(info.total_num_samples_stored as usize);
    Ok(out)
}

/// Writes `samples` into a fresh single-category store, used to seed the
/// pipeline from a synthetic [`crate::instance::LweInstance`] or from
/// `lpn-convert`'s challenge-file adaptor.
pub fn write_unsorted_store(dir: &std::path::Path, n: usize, q: u32, alpha: f64, samples: &[Sample]) -> Result<()> {
    let mut writer = StorageWriter::create(dir, n, q, alpha, unsorted_params(q), samples.len() as u64, samples.len() as u64)?;
    for sample in samples {
        let status = writer.add_sample(0, *sample);
        if status >= 2 {
            return Err(PipelineError::Allocation(
                "unsorted store capacity too small for seed samples".to_string(),
            ));
        }
    }
    writer.flush()?;
    Ok(())
}

/// Sorts an unsorted (single-category) store into the first category
/// store of the pipeline, per spec section 4.7. Unlike [`run_bkw_step`],
/// there is no combination: each sample is recategorized, unchanged, by
/// `dst_params`.
pub fn sort_unsorted_into_store(
    src_dir: &std::path::Path,
    dst_dir: &std::path::Path,
    n: usize,
    q: u32,
    alpha: f64,
    dst_params: BkwStepParameters,
    category_capacity_file: u64,
    category_capacity_buf: u64,
    min_flush_load_percent: f64,
) -> Result<StepStatus> {
    if dst_dir.exists() {
        return Ok(StepStatus::Skipped);
    }
    let samples = read_unsorted_store(src_dir)?;
    let mut writer = StorageWriter::create(
        dst_dir,
        n,
        q,
        alpha,
        dst_params,
        category_capacity_file,
        category_capacity_buf,
    )?;
    let start = dst_params.start_position;
    let end = start + dst_params.num_positions;
    for sample in samples {
        let category = dst_params.position_values_to_category_index(&sample.a[start..end]);
        writer.add_sample(category, sample);
        if writer.current_load_percentage_cache() >= min_flush_load_percent {
            writer.flush()?;
        }
    }
    writer.flush()?;
    Ok(StepStatus::Completed)
}

/// Mod-2 projection (spec section 4.10): centers every coordinate and
/// `sum_with_error` mod `q`, reduces mod 2, and writes an unsorted store
/// with `q = 2`.
pub fn mod2_project(src_dir: &std::path::Path, dst_dir: &std::path::Path, n: usize, q: u32) -> Result<StepStatus> {
    if dst_dir.exists() {
        return Ok(StepStatus::Skipped);
    }
    let samples = read_unsorted_store(src_dir)?;
    let projected: Vec<Sample> = samples
        .iter()
        .map(|s| {
            let mut out = *s;
            for i in 0..n {
                out.a[i] = centered_mod2(s.a[i], q);
            }
            out.sum_with_error = centered_mod2(s.sum_with_error, q);
            out.error = crate::sample::UNKNOWN_ERROR;
            out.recompute_hash(n, 0);
            out
        })
        .collect();
    write_unsorted_store(dst_dir, n, 2, 0.0, &projected)?;
    Ok(StepStatus::Completed)
}

fn centered_mod2(v: i16, q: u32) -> i16 {
    let v = v.rem_euclid(q as i16);
    if (v as i32) <= q as i32 / 2 {
        v % 2
    } else {
        ((v as i32 - q as i32).abs() % 2) as i16
    }
}

/// Rewrites the secret to its centered mod-2 image, matching the output
/// store's transformation in [`mod2_project`].
pub fn mod2_project_secret(s: &[i16], q: u32) -> Vec<i16> {
    s.iter().map(|&v| centered_mod2(v, q)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::{BkwStepParameters, SortingMode};
    use crate::instance::LweInstance;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn gen_samples(n: usize, q: u32, alpha: f64, count: usize, seed: u64) -> (LweInstance, Vec<Sample>) {
        let mut rng = SmallRng::seed_from_u64(seed);
        let instance = LweInstance::generate(n, q, alpha, &mut rng);
        let tables = ModTables::new(q);
        let samples = (0..count).map(|_| instance.random_sample(&mut rng, &tables)).collect();
        (instance, samples)
    }

    #[test]
    fn sort_then_one_bkw_step_zeroes_the_chosen_block() {
        let n = 4;
        let q = 101u32;
        let (_, samples) = gen_samples(n, q, 0.01, 400, 10);

        let tmp = tempfile::tempdir().unwrap();
        let seed_dir = tmp.path().join("seed");
        write_unsorted_store(&seed_dir, n, q, 0.01, &samples).unwrap();

        let store0_params = BkwStepParameters {
            sorting_mode: SortingMode::PlainBkw,
            start_position: 0,
            num_positions: 1,
            q,
            p: q,
            meta_skipped: 0,
            prev_p1: q,
        };
        let store0_dir = tmp.path().join("store0");
        let status = sort_unsorted_into_store(&seed_dir, &store0_dir, n, q, 0.01, store0_params, 64, 64, 25.0).unwrap();
        assert_eq!(status, StepStatus::Completed);

        let store1_params = BkwStepParameters {
            sorting_mode: SortingMode::PlainBkw,
            start_position: 1,
            num_positions: 1,
            q,
            p: q,
            meta_skipped: 0,
            prev_p1: q,
        };
        let store1_dir = tmp.path().join("store1");
        let status = run_bkw_step(
            &store0_dir,
            &store1_dir,
            n,
            q,
            0.01,
            store1_params,
            Selection::Lf1,
            64,
            64,
            25.0,
            99.0,
            None,
        )
        .unwrap();
        assert_eq!(status, StepStatus::Completed);

        let combined = read_unsorted_store_via_reader(&store1_dir);
        assert!(!combined.is_empty());
        for sample in &combined {
            assert_eq!(sample.a[0], 0, "BKW step should have cancelled position 0");
        }
    }

    fn read_unsorted_store_via_reader(dir: &std::path::Path) -> Vec<Sample> {
        let mut reader = StorageReader::open(dir, 8).unwrap();
        let mut out = Vec::new();
        loop {
            match reader.next_adjacent_category_pair().unwrap() {
                CategoryPair::Exhausted => break,
                CategoryPair::Singleton(c) => out.extend(c),
                CategoryPair::Pair(a, b) => {
                    out.extend(a);
                    out.extend(b);
                }
            }
        }
        out
    }

    #[test]
    fn run_bkw_step_is_skipped_when_destination_exists() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        std::fs::create_dir_all(&dst).unwrap();
        let params = BkwStepParameters {
            sorting_mode: SortingMode::PlainBkw,
            start_position: 0,
            num_positions: 1,
            q: 11,
            p: 11,
            meta_skipped: 0,
            prev_p1: 11,
        };
        let status = run_bkw_step(&src, &dst, 4, 11, 0.01, params, Selection::Lf1, 16, 16, 25.0, 99.0, None).unwrap();
        assert_eq!(status, StepStatus::Skipped);
    }

    #[test]
    fn mod2_projection_centers_every_coordinate() {
        let q = 101u32;
        let sample = Sample {
            a: {
                let mut a = [0i16; crate::sample::MAX_N];
                a[0] = 60; // centered: 60-101 = -41, |-41| mod 2 = 1
                a[1] = 4; // 4 mod 2 = 0
                a
            },
            hash: 0,
            error: 0,
            sum_with_error: 60,
        };
        assert_eq!(centered_mod2(sample.a[0], q), 1);
        assert_eq!(centered_mod2(sample.a[1], q), 0);
    }
}
