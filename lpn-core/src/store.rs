//! Sample-store directory layout: `params.txt`, `samples.dat`, and
//! `samples_info.txt`, one directory per pipeline stage.
//!
//! Grounded on `original_source/src/storage_file_utilities.c`: the same
//! three file names (`par_file_name`/`sam_file_name`/`sam_info_file_name`)
//! and the same three-way split of responsibilities
//! (`newStorageFolderWithGivenLweInstance`, `sampleInfoToFile`/
//! `sampleInfoFromFile`). `samples_info.txt` keeps the original's `key =
//! value` text grammar (spec section 6) rather than this workspace's
//! ambient JSON side-file convention (`whitebox-common/src/configs/mod.rs`)
//! — that convention is reserved for [`crate::config::PipelineConfig`],
//! which is not part of the external interface this file is.

use std::fs;
use std::path::{Path, PathBuf};

use crate::category::BkwStepParameters;
use crate::error::{io_err, PipelineError, Result};
use crate::instance::write_params_fields;

pub const SAMPLES_FILE_NAME: &str = "samples.dat";
pub const SAMPLES_INFO_FILE_NAME: &str = "samples_info.txt";
pub const PARAMS_FILE_NAME: &str = "params.txt";

/// A directory holding one stage's worth of samples plus its metadata.
#[derive(Debug, Clone)]
pub struct Store {
    pub dir: PathBuf,
}

/// Everything `samples_info.txt` records about the categories in a store:
/// how the samples were sorted and how many landed in each category.
#[derive(Debug, Clone)]
pub struct SampleInfo {
    pub sorting: SortingDescription,
    pub num_categories: u64,
    pub category_capacity: u64,
    pub total_num_samples_stored: u64,
    pub num_samples_per_category: Vec<u64>,
}

/// Serializable mirror of [`crate::category::BkwStepParameters`], matching
/// the `(mode, startIndex, numPositions, selection, mode_specific_fields)`
/// descriptor spec section 6 calls for.
#[derive(Debug, Clone)]
pub struct SortingDescription {
    pub mode: String,
    pub start_position: usize,
    pub num_positions: usize,
    pub q: u32,
    pub p: u32,
    /// `p1`, smoothLMS's second scale. `0` outside [`crate::category::SortingMode::SmoothLms`].
    pub p1: u32,
    pub meta_skipped: u8,
    pub prev_p1: u32,
}

impl From<&BkwStepParameters> for SortingDescription {
    fn from(params: &BkwStepParameters) -> Self {
        use crate::category::{CodeVariant, SortingMode};
        let (mode, p1) = match params.sorting_mode {
            SortingMode::PlainBkw => ("plain_bkw".to_string(), 0),
            SortingMode::Lms => ("lms".to_string(), 0),
            SortingMode::SmoothLms { p1 } => ("smooth_lms".to_string(), p1),
            SortingMode::CodedBkw(CodeVariant::C2_1) => ("coded_bkw_2_1".to_string(), 0),
            SortingMode::CodedBkw(CodeVariant::C3_1) => ("coded_bkw_3_1".to_string(), 0),
            SortingMode::CodedBkw(CodeVariant::C4_1) => ("coded_bkw_4_1".to_string(), 0),
            SortingMode::CodedBkw(CodeVariant::Concat2_1_2_1) => ("coded_bkw_concat_2_1_2_1".to_string(), 0),
        };
        SortingDescription {
            mode,
            start_position: params.start_position,
            num_positions: params.num_positions,
            q: params.q,
            p: params.p,
            p1,
            meta_skipped: params.meta_skipped,
            prev_p1: params.prev_p1,
        }
    }
}

/// Reconstructs [`BkwStepParameters`] from the description stored alongside
/// a category-sorted store.
pub fn sorting_description_to_params(desc: &SortingDescription) -> Result<BkwStepParameters> {
    use crate::category::{CodeVariant, SortingMode};
    let sorting_mode = match desc.mode.as_str() {
        "plain_bkw" => SortingMode::PlainBkw,
        "lms" => SortingMode::Lms,
        "smooth_lms" => SortingMode::SmoothLms { p1: desc.p1 },
        "coded_bkw_2_1" => SortingMode::CodedBkw(CodeVariant::C2_1),
        "coded_bkw_3_1" => SortingMode::CodedBkw(CodeVariant::C3_1),
        "coded_bkw_4_1" => SortingMode::CodedBkw(CodeVariant::C4_1),
        "coded_bkw_concat_2_1_2_1" => SortingMode::CodedBkw(CodeVariant::Concat2_1_2_1),
        other => {
            return Err(PipelineError::UnsupportedConfiguration(format!(
                "unknown sorting mode {other:?} in samples_info.txt"
            )))
        }
    };
    Ok(BkwStepParameters {
        sorting_mode,
        start_position: desc.start_position,
        num_positions: desc.num_positions,
        q: desc.q,
        p: desc.p,
        meta_skipped: desc.meta_skipped,
        prev_p1: desc.prev_p1,
    })
}

impl SortingDescription {
    /// Parseable one-line form of `(mode, startIndex, numPositions,
    /// mode_specific_fields)`, spec section 6's sorting descriptor grammar.
    pub fn sorting_as_string(&self) -> String {
        format!(
            "{}(start={},num_positions={},q={},p={},p1={},meta_skipped={},prev_p1={})",
            self.mode,
            self.start_position,
            self.num_positions,
            self.q,
            self.p,
            self.p1,
            self.meta_skipped,
            self.prev_p1,
        )
    }

    pub fn sorting_from_string(s: &str) -> Result<SortingDescription> {
        let bad = |reason: String| PipelineError::BadSampleInfo {
            path: PathBuf::from("samples_info.txt"),
            reason,
        };
        let (mode, rest) = s.split_once('(').ok_or_else(|| bad(format!("{s:?} has no field list")))?;
        let rest = rest.strip_suffix(')').ok_or_else(|| bad(format!("{s:?} is not closed with ')'")))?;

        let mut start_position = None;
        let mut num_positions = None;
        let mut q = None;
        let mut p = None;
        let mut p1 = None;
        let mut meta_skipped = None;
        let mut prev_p1 = None;
        for field in rest.split(',') {
            let (key, value) = field
                .split_once('=')
                .ok_or_else(|| bad(format!("field {field:?} is not key=value")))?;
            let parse_err = |_| bad(format!("field {field:?} has a non-numeric value"));
            match key {
                "start" => start_position = Some(value.parse().map_err(parse_err)?),
                "num_positions" => num_positions = Some(value.parse().map_err(parse_err)?),
                "q" => q = Some(value.parse().map_err(parse_err)?),
                "p" => p = Some(value.parse().map_err(parse_err)?),
                "p1" => p1 = Some(value.parse().map_err(parse_err)?),
                "meta_skipped" => meta_skipped = Some(value.parse().map_err(parse_err)?),
                "prev_p1" => prev_p1 = Some(value.parse().map_err(parse_err)?),
                other => return Err(bad(format!("unknown sorting field {other:?}"))),
            }
        }
        Ok(SortingDescription {
            mode: mode.to_string(),
            start_position: start_position.ok_or_else(|| bad(format!("{s:?} is missing start")))?,
            num_positions: num_positions.ok_or_else(|| bad(format!("{s:?} is missing num_positions")))?,
            q: q.ok_or_else(|| bad(format!("{s:?} is missing q")))?,
            p: p.ok_or_else(|| bad(format!("{s:?} is missing p")))?,
            p1: p1.ok_or_else(|| bad(format!("{s:?} is missing p1")))?,
            meta_skipped: meta_skipped.ok_or_else(|| bad(format!("{s:?} is missing meta_skipped")))?,
            prev_p1: prev_p1.ok_or_else(|| bad(format!("{s:?} is missing prev_p1")))?,
        })
    }
}

impl Store {
    pub fn samples_path(&self) -> PathBuf {
        self.dir.join(SAMPLES_FILE_NAME)
    }

    pub fn info_path(&self) -> PathBuf {
        self.dir.join(SAMPLES_INFO_FILE_NAME)
    }

    pub fn params_path(&self) -> PathBuf {
        self.dir.join(PARAMS_FILE_NAME)
    }

    /// Creates a fresh store directory with an empty samples file and a
    /// `params.txt`. Fails with [`PipelineError::DestinationExists`] if the
    /// directory is already there, matching `mkdir`'s "already exists"
    /// return code in the original.
    pub fn create(dir: &Path, n: usize, q: u32, alpha: f64) -> Result<Store> {
        if dir.exists() {
            return Err(PipelineError::DestinationExists(dir.to_path_buf()));
        }
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        write_params_fields(dir, n, q, alpha)?;
        let samples_path = dir.join(SAMPLES_FILE_NAME);
        fs::write(&samples_path, []).map_err(|e| io_err(&samples_path, e))?;
        Ok(Store { dir: dir.to_path_buf() })
    }

    pub fn open(dir: &Path) -> Result<Store> {
        if !dir.join(PARAMS_FILE_NAME).exists() {
            return Err(PipelineError::BadParameters {
                path: dir.join(PARAMS_FILE_NAME),
                reason: "store directory has no params.txt".to_string(),
            });
        }
        Ok(Store { dir: dir.to_path_buf() })
    }

    /// Writes `samples_info.txt` in spec section 6's `key = value` grammar
    /// (not JSON — that's reserved for the ambient [`crate::config::PipelineConfig`]
    /// side-file, a different, non-external-interface concern).
    pub fn write_info(&self, info: &SampleInfo) -> Result<()> {
        let path = self.info_path();
        let counts = info
            .num_samples_per_category
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let body = format!(
            "sorting = {}\n\
             num categories = {}\n\
             category capacity (num samples) = {}\n\
             total num samples stored = {}\n\
             num samples per category = ({counts})\n",
            info.sorting.sorting_as_string(),
            info.num_categories,
            info.category_capacity,
            info.total_num_samples_stored,
        );
        fs::write(&path, body).map_err(|e| io_err(&path, e))
    }

    pub fn read_info(&self) -> Result<SampleInfo> {
        let path = self.info_path();
        let text = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let bad = |reason: String| PipelineError::BadSampleInfo { path: path.clone(), reason };

        let mut sorting = None;
        let mut num_categories = None;
        let mut category_capacity = None;
        let mut total_num_samples_stored = None;
        let mut num_samples_per_category = None;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| bad(format!("line {line:?} is not key = value")))?;
            let key = key.trim();
            let value = value.trim();
            match key {
                "sorting" => sorting = Some(SortingDescription::sorting_from_string(value)?),
                "num categories" => {
                    num_categories =
                        Some(value.parse::<u64>().map_err(|e| bad(format!("bad num categories: {e}")))?)
                }
                "category capacity (num samples)" => {
                    category_capacity =
                        Some(value.parse::<u64>().map_err(|e| bad(format!("bad category capacity: {e}")))?)
                }
                "total num samples stored" => {
                    total_num_samples_stored =
                        Some(value.parse::<u64>().map_err(|e| bad(format!("bad total num samples stored: {e}")))?)
                }
                "num samples per category" => {
                    let inner = value
                        .strip_prefix('(')
                        .and_then(|v| v.strip_suffix(')'))
                        .ok_or_else(|| bad(format!("{value:?} is not a (...) list")))?;
                    num_samples_per_category = Some(
                        inner
                            .split(',')
                            .filter(|s| !s.is_empty())
                            .map(|s| s.parse::<u64>())
                            .collect::<std::result::Result<Vec<u64>, _>>()
                            .map_err(|e| bad(format!("bad num samples per category: {e}")))?,
                    );
                }
                other => return Err(bad(format!("unknown samples_info.txt key {other:?}"))),
            }
        }
        Ok(SampleInfo {
            sorting: sorting.ok_or_else(|| bad("missing sorting".to_string()))?,
            num_categories: num_categories.ok_or_else(|| bad("missing num categories".to_string()))?,
            category_capacity: category_capacity.ok_or_else(|| bad("missing category capacity".to_string()))?,
            total_num_samples_stored: total_num_samples_stored
                .ok_or_else(|| bad("missing total num samples stored".to_string()))?,
            num_samples_per_category: num_samples_per_category
                .ok_or_else(|| bad("missing num samples per category".to_string()))?,
        })
    }
}
