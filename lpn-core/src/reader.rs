//! Sequential, read-ahead category reader.
//!
//! Grounded on `original_source/src/storage_reader.c`:
//! `storageReaderGetNextAdjacentCategoryPair` walks the category space in
//! order, returning a lone category when `is_singleton` says it has no
//! partner, otherwise the next two categories together — refilling its
//! read-ahead buffer first if the second category of a pair hasn't been
//! read yet. The original hands back raw pointers into a shared buffer
//! (and a `minibuf` to keep a not-yet-consumed category alive across a
//! refill); this port returns owned `Vec<Sample>` categories instead,
//! which costs a copy but removes the aliasing the C version manages by
//! hand.

use std::fs::File;
use std::path::Path;

use crate::category::BkwStepParameters;
use crate::error::{io_err, PipelineError, Result};
use crate::format::SampleReader as RawSampleReader;
use crate::sample::Sample;
use crate::store::Store;

/// Minimum number of categories to keep read-ahead in the buffer.
const MIN_BUFFER_CAPACITY_CATEGORIES: u64 = 3;

pub enum CategoryPair {
    /// No adjacent category this one can be combined against.
    Singleton(Vec<Sample>),
    /// Two adjacent categories, read together.
    Pair(Vec<Sample>, Vec<Sample>),
    /// The category space has been fully consumed.
    Exhausted,
}

pub struct StorageReader {
    file: File,
    path: std::path::PathBuf,
    bkw_step_par: BkwStepParameters,
    num_categories: u64,
    category_capacity: u64,
    num_samples_per_category: Vec<u64>,
    buffer_capacity_num_categories: u64,
    buf: Vec<Sample>,
    index_of_first_category_in_buffer: u64,
    num_categories_in_buffer: u64,
    current_category_index: u64,
}

impl StorageReader {
    pub fn open(dir: &Path, buffer_capacity_num_categories: u64) -> Result<StorageReader> {
        let store = Store::open(dir)?;
        let info = store.read_info()?;
        let samples_path = store.samples_path();
        let file = File::open(&samples_path).map_err(|e| io_err(&samples_path, e))?;
        let bkw_step_par = crate::store::sorting_description_to_params(&info.sorting)?;
        let buffer_capacity_num_categories = buffer_capacity_num_categories.max(MIN_BUFFER_CAPACITY_CATEGORIES);
        Ok(StorageReader {
            file,
            path: samples_path,
            bkw_step_par,
            num_categories: info.num_categories,
            category_capacity: info.category_capacity,
            num_samples_per_category: info.num_samples_per_category,
            buffer_capacity_num_categories,
            buf: Vec::new(),
            index_of_first_category_in_buffer: 0,
            num_categories_in_buffer: 0,
            current_category_index: 0,
        })
    }

    pub fn num_categories(&self) -> u64 {
        self.num_categories
    }

    fn fill_buf(&mut self, num_categories_to_read: u64) -> Result<u64> {
        let mut reader = RawSampleReader::new(&mut self.file);
        let mut flat = Vec::with_capacity((num_categories_to_read * self.category_capacity) as usize);
        let mut read_categories = 0u64;
        'outer: for _ in 0..num_categories_to_read {
            for _ in 0..self.category_capacity {
                match reader.read_sample().map_err(|e| io_err(&self.path, e))? {
                    Some(s) => flat.push(s),
                    None => break 'outer,
                }
            }
            read_categories += 1;
        }
        if self.num_categories_in_buffer > 0 {
            self.index_of_first_category_in_buffer += self.num_categories_in_buffer;
        }
        self.buf = flat;
        self.num_categories_in_buffer = read_categories;
        Ok(read_categories)
    }

    fn category_slice(&self, offset_in_buffer: u64, len: u64) -> Vec<Sample> {
        let start = (offset_in_buffer * self.category_capacity) as usize;
        let end = start + len as usize;
        self.buf[start..end].to_vec()
    }

    pub fn next_adjacent_category_pair(&mut self) -> Result<CategoryPair> {
        if self.current_category_index >= self.num_categories {
            return Ok(CategoryPair::Exhausted);
        }

        let first_time = self.num_categories_in_buffer == 0;
        let exhausted_in_buffer =
            self.current_category_index >= self.index_of_first_category_in_buffer + self.num_categories_in_buffer;
        if first_time || exhausted_in_buffer {
            let read = self.fill_buf(self.buffer_capacity_num_categories)?;
            if read == 0 {
                return Ok(CategoryPair::Exhausted);
            }
        }

        if self.bkw_step_par.is_singleton(self.current_category_index) {
            let offset = self.current_category_index - self.index_of_first_category_in_buffer;
            let n1 = self.num_samples_per_category[self.current_category_index as usize];
            let cat1 = self.category_slice(offset, n1);
            self.current_category_index += 1;
            return Ok(CategoryPair::Singleton(cat1));
        }

        let num_available =
            self.index_of_first_category_in_buffer + self.num_categories_in_buffer - self.current_category_index;
        let offset = self.current_category_index - self.index_of_first_category_in_buffer;
        let n1 = self.num_samples_per_category[self.current_category_index as usize];
        let n2 = self.num_samples_per_category[self.current_category_index as usize + 1];

        let (cat1, cat2) = if num_available >= 2 {
            (self.category_slice(offset, n1), self.category_slice(offset + 1, n2))
        } else {
            let cat1 = self.category_slice(offset, n1);
            let read = self.fill_buf(self.buffer_capacity_num_categories)?;
            if read == 0 {
                return Err(PipelineError::BadSampleInfo {
                    path: self.path.clone(),
                    reason: "expected another category while pairing but file is exhausted".to_string(),
                });
            }
            let offset2 = self.current_category_index + 1 - self.index_of_first_category_in_buffer;
            (cat1, self.category_slice(offset2, n2))
        };
        self.current_category_index += 2;
        Ok(CategoryPair::Pair(cat1, cat2))
    }
}
