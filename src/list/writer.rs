//! Buffered record writer

use crate::error::{ListError, ListResult};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Appends separator-terminated records to a single list file.
///
/// Each list file has exactly one writer; call [`RecordWriter::finish`] to
/// flush and surface the final write error.
pub struct RecordWriter {
    inner: BufWriter<File>,
    path: PathBuf,
    separator: u8,
    records: u64,
}

impl RecordWriter {
    /// Create (or truncate) a list file
    pub fn create(path: &Path, separator: u8, buffer_size: usize) -> ListResult<Self> {
        let file = File::create(path).map_err(|e| ListError::io(path, e))?;
        Ok(Self {
            inner: BufWriter::with_capacity(buffer_size.max(1), file),
            path: path.to_path_buf(),
            separator,
            records: 0,
        })
    }

    /// Append one record
    pub fn write_record(&mut self, record: &[u8]) -> ListResult<()> {
        self.write_parts(&[record])
    }

    /// Append one record assembled from several slices
    pub fn write_parts(&mut self, parts: &[&[u8]]) -> ListResult<()> {
        for part in parts {
            self.inner
                .write_all(part)
                .map_err(|e| ListError::io(&self.path, e))?;
        }
        self.inner
            .write_all(&[self.separator])
            .map_err(|e| ListError::io(&self.path, e))?;
        self.records += 1;
        Ok(())
    }

    /// Records written so far
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Flush and close the file, returning the record count
    pub fn finish(mut self) -> ListResult<u64> {
        self.inner.flush().map_err(|e| ListError::io(&self.path, e))?;
        Ok(self.records)
    }
}

/// Write every record of `records` to a fresh file at `path`
pub fn dump_records<I, T>(path: &Path, separator: u8, buffer_size: usize, records: I) -> ListResult<u64>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = RecordWriter::create(path, separator, buffer_size)?;
    for record in records {
        writer.write_record(record.as_ref())?;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::{CodecConfig, RecordReader, NUL};

    #[test]
    fn test_dump_and_stream_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list");

        let paths: Vec<&[u8]> = vec![
            &b"plain.txt"[..],
            &b""[..],
            &b"with space/and\\#012 escape"[..],
            &b"latin1-\xe9t\xe9"[..],
            &b""[..],
        ];
        let written = dump_records(&path, NUL, 8, &paths).unwrap();
        assert_eq!(written, 5);

        let config = CodecConfig {
            buffer_size: 7,
            max_record_len: 64,
        };
        let back: Vec<Vec<u8>> = RecordReader::open(&path, NUL, &config)
            .unwrap()
            .collect::<ListResult<_>>()
            .unwrap();
        let expected: Vec<Vec<u8>> = paths.iter().map(|p| p.to_vec()).collect();
        assert_eq!(back, expected);
    }

    #[test]
    fn test_write_parts_joins_into_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("items");

        let mut writer = RecordWriter::create(&path, NUL, 16).unwrap();
        let parts: [&[u8]; 5] = [b"F", b" ", b"12", b" ", b"a b"];
        writer.write_parts(&parts).unwrap();
        writer.write_record(b"next").unwrap();
        assert_eq!(writer.records(), 2);
        writer.finish().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"F 12 a b\0next\0");
    }

    #[test]
    fn test_dump_empty_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty");
        let written = dump_records(&path, NUL, 16, Vec::<Vec<u8>>::new()).unwrap();
        assert_eq!(written, 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }
}
