//! Fixed-stride binary encoding of [`Sample`] records.
//!
//! Adapted from `whitebox-common/src/utils/byte_order_reader.rs` and
//! `byte_order_writer.rs`: a thin `Read`/`Write` wrapper that tracks its own
//! position and always uses a fixed byte order, rather than depending on
//! the OS file cursor.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::sample::{Sample, MAX_N, SAMPLE_RECORD_SIZE};

/// Reads fixed-stride [`Sample`] records from any `Read` source.
pub struct SampleReader<R: Read> {
    inner: R,
    pos: u64,
}

impl<R: Read> SampleReader<R> {
    pub fn new(inner: R) -> Self {
        SampleReader { inner, pos: 0 }
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Reads one record, or `None` on clean end-of-stream (zero bytes read
    /// before the first field).
    pub fn read_sample(&mut self) -> io::Result<Option<Sample>> {
        let mut a = [0i16; MAX_N];
        for (i, slot) in a.iter_mut().enumerate() {
            match self.inner.read_i16::<LittleEndian>() {
                Ok(v) => *slot = v,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && i == 0 => return Ok(None),
                Err(e) => return Err(e),
            }
        }
        let hash = self.inner.read_u64::<LittleEndian>()?;
        let error = self.inner.read_i16::<LittleEndian>()?;
        let sum_with_error = self.inner.read_i16::<LittleEndian>()?;
        self.pos += SAMPLE_RECORD_SIZE as u64;
        Ok(Some(Sample {
            a,
            hash,
            error,
            sum_with_error,
        }))
    }
}

/// Writes fixed-stride [`Sample`] records to any `Write` sink.
pub struct SampleWriter<W: Write> {
    inner: W,
    num_bytes_written: u64,
}

impl<W: Write> SampleWriter<W> {
    pub fn new(inner: W) -> Self {
        SampleWriter {
            inner,
            num_bytes_written: 0,
        }
    }

    pub fn num_bytes_written(&self) -> u64 {
        self.num_bytes_written
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn write_sample(&mut self, sample: &Sample) -> io::Result<()> {
        for v in sample.a.iter() {
            self.inner.write_i16::<LittleEndian>(*v)?;
        }
        self.inner.write_u64::<LittleEndian>(sample.hash)?;
        self.inner.write_i16::<LittleEndian>(sample.error)?;
        self.inner.write_i16::<LittleEndian>(sample.sum_with_error)?;
        self.num_bytes_written += SAMPLE_RECORD_SIZE as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_with(a0: i16) -> Sample {
        let mut s = Sample::default();
        s.a[0] = a0;
        s.error = 3;
        s.sum_with_error = 7;
        s.recompute_hash(MAX_N, 0);
        s
    }

    #[test]
    fn round_trips_a_handful_of_records() {
        let samples = vec![sample_with(1), sample_with(-5), sample_with(0)];
        let mut buf = Vec::new();
        {
            let mut w = SampleWriter::new(&mut buf);
            for s in &samples {
                w.write_sample(s).unwrap();
            }
        }
        assert_eq!(buf.len(), samples.len() * SAMPLE_RECORD_SIZE);

        let mut r = SampleReader::new(&buf[..]);
        for expected in &samples {
            let got = r.read_sample().unwrap().unwrap();
            assert_eq!(got, *expected);
        }
        assert!(r.read_sample().unwrap().is_none());
    }
}
