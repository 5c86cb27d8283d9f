//! Buffered, category-partitioned sample writer.
//!
//! Grounded on `original_source/src/storage_writer.c`: a per-category
//! cache (`buf`/`numStoredBuf`) is filled by [`StorageWriter::add_sample`]
//! and periodically drained to the category-capacity-sized slots of the
//! backing file by [`StorageWriter::flush`]. [`StorageWriter::has_room`]
//! mirrors `storageWriterHasRoom`'s four-way status
//! (0 = room in cache, 1 = room but this is the cache's last free slot,
//! 2 = cache full but file has room after a flush, 3 = category is full).
//! The original batches many categories per disk read/write super-chunk
//! for throughput; this port seeks and writes one category at a time,
//! which is simpler and still flushes in `O(categories)` I/O operations —
//! noted as a deliberate simplification in `DESIGN.md`.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::Path;

use crate::category::BkwStepParameters;
use crate::error::{io_err, Result};
use crate::format::SampleWriter;
use crate::sample::{Sample, SAMPLE_RECORD_SIZE};
use crate::store::{SampleInfo, Store};

pub struct StorageWriter {
    store: Store,
    file: File,
    bkw_step_par: BkwStepParameters,
    num_categories: u64,
    category_capacity_buf: u64,
    category_capacity_file: u64,
    num_stored_buf: Vec<u64>,
    num_stored_file: Vec<u64>,
    buf: Vec<Sample>,
    pub total_num_samples_processed: u64,
    pub total_num_samples_currently_in_writer: u64,
    pub total_num_samples_added: u64,
    pub total_num_samples_written_to_file: u64,
}

impl StorageWriter {
    /// Creates the destination store and pre-extends its samples file to
    /// `num_categories * category_capacity_file` records.
    pub fn create(
        dir: &Path,
        n: usize,
        q: u32,
        alpha: f64,
        bkw_step_par: BkwStepParameters,
        category_capacity_file: u64,
        category_capacity_buf: u64,
    ) -> Result<StorageWriter> {
        let store = Store::create(dir, n, q, alpha)?;
        let num_categories = bkw_step_par.num_categories();
        let samples_path = store.samples_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&samples_path)
            .map_err(|e| io_err(&samples_path, e))?;
        let total_len = num_categories * category_capacity_file * SAMPLE_RECORD_SIZE as u64;
        file.set_len(total_len).map_err(|e| io_err(&samples_path, e))?;

        let category_capacity_buf = category_capacity_buf.min(category_capacity_file);
        let writer = StorageWriter {
            store,
            file,
            bkw_step_par,
            num_categories,
            category_capacity_buf,
            category_capacity_file,
            num_stored_buf: vec![0; num_categories as usize],
            num_stored_file: vec![0; num_categories as usize],
            buf: vec![Sample::default(); (num_categories * category_capacity_buf) as usize],
            total_num_samples_processed: 0,
            total_num_samples_currently_in_writer: 0,
            total_num_samples_added: 0,
            total_num_samples_written_to_file: 0,
        };
        writer.write_info()?;
        Ok(writer)
    }

    fn write_info(&self) -> Result<()> {
        self.store.write_info(&SampleInfo {
            sorting: (&self.bkw_step_par).into(),
            num_categories: self.num_categories,
            category_capacity: self.category_capacity_file,
            total_num_samples_stored: self.total_num_samples_written_to_file,
            num_samples_per_category: self.num_stored_file.clone(),
        })
    }

    /// Four-way admission status for `category_index`, computed before the
    /// caller materializes a combined sample — lets a BKW step skip the
    /// (comparatively expensive) full combination for categories with no
    /// room left anywhere.
    pub fn has_room(&self, category_index: u64) -> u8 {
        let i = category_index as usize;
        if self.num_stored_buf[i] + self.num_stored_file[i] < self.category_capacity_file {
            if self.num_stored_buf[i] < self.category_capacity_buf.saturating_sub(1) {
                0
            } else if self.num_stored_buf[i] == self.category_capacity_buf - 1 {
                1
            } else {
                2
            }
        } else {
            3
        }
    }

    /// Reserves a cache slot for `sample` in `category_index`, returning
    /// the admission status. Status `>= 2` means the sample was not
    /// stored; the caller should flush and retry, or skip the category.
    pub fn add_sample(&mut self, category_index: u64, sample: Sample) -> u8 {
        self.total_num_samples_processed += 1;
        let status = self.has_room(category_index);
        if status < 2 {
            let slot = (category_index * self.category_capacity_buf + self.num_stored_buf[category_index as usize]) as usize;
            self.buf[slot] = sample;
            self.num_stored_buf[category_index as usize] += 1;
            self.total_num_samples_currently_in_writer += 1;
            self.total_num_samples_added += 1;
        }
        status
    }

    /// Rolls back the most recently added sample in `category_index` —
    /// used to discard combinations that turn out to land on the zero
    /// column after all (spec section 4, "zero-column suppression").
    pub fn undo_add_sample(&mut self, category_index: u64) {
        let i = category_index as usize;
        self.num_stored_buf[i] -= 1;
        self.total_num_samples_currently_in_writer -= 1;
        self.total_num_samples_added -= 1;
    }

    /// Drains every category's cache into the backing file, clipping
    /// samples that no longer fit once the file side is also full.
    pub fn flush(&mut self) -> Result<()> {
        if self.total_num_samples_currently_in_writer == 0 {
            return Ok(());
        }
        let samples_path = self.store.samples_path();
        for cat in 0..self.num_categories as usize {
            let n_buf = self.num_stored_buf[cat];
            if n_buf == 0 {
                continue;
            }
            let n_file = self.num_stored_file[cat];
            let n_copy = if n_file + n_buf > self.category_capacity_file {
                self.category_capacity_file - n_file
            } else {
                n_buf
            };
            if n_copy > 0 {
                let offset = (cat as u64 * self.category_capacity_file + n_file) * SAMPLE_RECORD_SIZE as u64;
                self.file
                    .seek(SeekFrom::Start(offset))
                    .map_err(|e| io_err(&samples_path, e))?;
                let mut writer = SampleWriter::new(&mut self.file);
                let base = cat as u64 * self.category_capacity_buf;
                for i in 0..n_copy {
                    writer
                        .write_sample(&self.buf[(base + i) as usize])
                        .map_err(|e| io_err(&samples_path, e))?;
                }
            }
            self.total_num_samples_currently_in_writer -= n_buf;
            self.num_stored_buf[cat] = 0;
            self.num_stored_file[cat] += n_copy;
            self.total_num_samples_written_to_file += n_copy;
        }
        self.write_info()
    }

    pub fn current_load_percentage_cache(&self) -> f64 {
        100.0 * self.total_num_samples_currently_in_writer as f64
            / (self.category_capacity_buf * self.num_categories) as f64
    }

    pub fn current_load_percentage_file(&self) -> f64 {
        100.0 * self.total_num_samples_written_to_file as f64
            / (self.category_capacity_file * self.num_categories) as f64
    }

    pub fn num_categories(&self) -> u64 {
        self.num_categories
    }

    pub fn into_store(mut self) -> Result<Store> {
        self.flush()?;
        Ok(self.store.clone())
    }
}

impl Drop for StorageWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::SortingMode;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn make_writer(dir: &Path, cap_file: u64, cap_buf: u64) -> StorageWriter {
        let params = BkwStepParameters {
            sorting_mode: SortingMode::PlainBkw,
            start_position: 0,
            num_positions: 1,
            q: 11,
            p: 11,
            meta_skipped: 0,
            prev_p1: 11,
        };
        StorageWriter::create(dir, 4, 11, 0.01, params, cap_file, cap_buf).unwrap()
    }

    #[test]
    fn add_sample_reports_room_then_full_status() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writer = make_writer(&tmp.path().join("store"), 2, 2);
        assert_eq!(writer.has_room(0), 0);
        assert_eq!(writer.add_sample(0, Sample::default()), 0);
        assert_eq!(writer.add_sample(0, Sample::default()), 1);
        assert_eq!(writer.add_sample(0, Sample::default()), 2);
    }

    #[test]
    fn undo_add_sample_frees_the_reserved_slot() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writer = make_writer(&tmp.path().join("store"), 2, 2);
        writer.add_sample(0, Sample::default());
        writer.undo_add_sample(0);
        assert_eq!(writer.total_num_samples_currently_in_writer, 0);
        assert_eq!(writer.add_sample(0, Sample::default()), 0);
    }

    #[test]
    fn flush_moves_cached_samples_to_file_and_updates_counts() {
        let tmp = tempfile::tempdir().unwrap();
        let mut writer = make_writer(&tmp.path().join("store"), 4, 4);
        for _ in 0..3 {
            writer.add_sample(0, Sample::default());
        }
        writer.flush().unwrap();
        assert_eq!(writer.total_num_samples_currently_in_writer, 0);
        assert_eq!(writer.total_num_samples_written_to_file, 3);
        assert_eq!(writer.num_stored_file[0], 3);
    }
}
