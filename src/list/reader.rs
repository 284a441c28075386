//! Chunked record reader

use crate::error::{ListError, ListResult};
use crate::list::CodecConfig;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

/// Pull-based reader over separator-terminated records.
///
/// Yields every record exactly once, in file order, including a final
/// record that is not followed by a separator. After an error the iterator
/// is fused and yields nothing more.
pub struct RecordReader<R> {
    /// Underlying byte source
    inner: R,

    /// Name used in error messages
    path: PathBuf,

    separator: u8,
    max_record_len: usize,

    /// Current chunk
    chunk: Vec<u8>,

    /// Bytes of `chunk` that hold data
    filled: usize,

    /// Start of the unconsumed part of `chunk`
    pos: usize,

    /// Partial record carried over from previous chunks
    carry: Vec<u8>,

    done: bool,
}

impl RecordReader<File> {
    /// Open a list file for reading
    pub fn open(path: &Path, separator: u8, config: &CodecConfig) -> ListResult<Self> {
        let file = File::open(path).map_err(|e| ListError::io(path, e))?;
        Ok(Self::with_reader(file, path, separator, config))
    }
}

impl<R: Read> RecordReader<R> {
    /// Wrap an arbitrary byte source; `name` only appears in errors
    pub fn with_reader(inner: R, name: impl Into<PathBuf>, separator: u8, config: &CodecConfig) -> Self {
        Self {
            inner,
            path: name.into(),
            separator,
            max_record_len: config.max_record_len,
            chunk: vec![0; config.buffer_size.max(1)],
            filled: 0,
            pos: 0,
            carry: Vec::new(),
            done: false,
        }
    }

    fn fill(&mut self) -> ListResult<usize> {
        loop {
            match self.inner.read(&mut self.chunk) {
                Ok(n) => {
                    self.filled = n;
                    self.pos = 0;
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ListError::io(&self.path, e)),
            }
        }
    }

    fn check_len(&self, len: usize) -> ListResult<()> {
        if len > self.max_record_len {
            return Err(ListError::Corrupt {
                path: self.path.clone(),
                separator: self.separator,
                max_len: self.max_record_len,
            });
        }
        Ok(())
    }

    fn next_record(&mut self) -> ListResult<Option<Vec<u8>>> {
        loop {
            if self.pos < self.filled {
                let window = &self.chunk[self.pos..self.filled];
                if let Some(idx) = window.iter().position(|&b| b == self.separator) {
                    self.check_len(self.carry.len() + idx)?;
                    let mut record = std::mem::take(&mut self.carry);
                    record.extend_from_slice(&window[..idx]);
                    self.pos += idx + 1;
                    return Ok(Some(record));
                }

                self.carry.extend_from_slice(window);
                self.pos = self.filled;
                self.check_len(self.carry.len())?;
            }

            if self.fill()? == 0 {
                // Last record without a trailing separator
                if self.carry.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(std::mem::take(&mut self.carry)));
            }
        }
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = ListResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Stream every record of `path` into `process`.
///
/// Stops at the first error, whether from the reader or from `process`.
pub fn stream_records<F, E>(path: &Path, separator: u8, config: &CodecConfig, mut process: F) -> Result<u64, E>
where
    F: FnMut(Vec<u8>) -> Result<(), E>,
    E: From<ListError>,
{
    let mut count = 0u64;
    for record in RecordReader::open(path, separator, config)? {
        process(record?)?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::NUL;
    use std::io::{self, Cursor};

    fn small() -> CodecConfig {
        CodecConfig {
            buffer_size: 4,
            max_record_len: 16,
        }
    }

    fn collect(data: &[u8], config: &CodecConfig) -> Vec<Vec<u8>> {
        RecordReader::with_reader(Cursor::new(data.to_vec()), "mem", NUL, config)
            .collect::<ListResult<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_records_straddle_chunks() {
        let records = collect(b"alpha\0be\0gamma/delta\0", &small());
        assert_eq!(records, vec![b"alpha".to_vec(), b"be".to_vec(), b"gamma/delta".to_vec()]);
    }

    #[test]
    fn test_final_record_without_separator() {
        let records = collect(b"a\0tail", &small());
        assert_eq!(records, vec![b"a".to_vec(), b"tail".to_vec()]);
    }

    #[test]
    fn test_empty_records_are_kept() {
        let records = collect(b"\0a\0\0", &CodecConfig::default());
        assert_eq!(records, vec![Vec::new(), b"a".to_vec(), Vec::new()]);
    }

    #[test]
    fn test_empty_input() {
        assert!(collect(b"", &small()).is_empty());
    }

    #[test]
    fn test_newline_separator() {
        let reader = RecordReader::with_reader(Cursor::new(b"x y\nz\n".to_vec()), "mem", b'\n', &small());
        let records: Vec<_> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(records, vec![b"x y".to_vec(), b"z".to_vec()]);
    }

    #[test]
    fn test_record_at_limit_is_accepted() {
        let config = small();
        let mut data = vec![b'x'; config.max_record_len];
        data.push(NUL);
        let records = collect(&data, &config);
        assert_eq!(records[0].len(), config.max_record_len);
    }

    #[test]
    fn test_corrupt_input_detected() {
        let data = vec![b'x'; 64];
        let mut reader = RecordReader::with_reader(Cursor::new(data), "mem", NUL, &small());
        match reader.next() {
            Some(Err(ListError::Corrupt { separator, max_len, .. })) => {
                assert_eq!(separator, NUL);
                assert_eq!(max_len, 16);
            }
            other => panic!("expected corrupt input error, got {:?}", other.map(|r| r.map(|v| v.len()))),
        }
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_overlong_record_inside_one_chunk() {
        let config = CodecConfig {
            buffer_size: 64,
            max_record_len: 16,
        };
        let mut data = b"ok\0".to_vec();
        data.extend_from_slice(&[b'x'; 20]);
        data.push(NUL);

        let mut reader = RecordReader::with_reader(Cursor::new(data), "mem", NUL, &config);
        assert_eq!(reader.next().unwrap().unwrap(), b"ok".to_vec());
        assert!(matches!(reader.next(), Some(Err(ListError::Corrupt { max_len: 16, .. }))));
    }

    #[test]
    fn test_corrupt_input_on_endless_stream_is_bounded() {
        // io::repeat never ends and never yields a separator
        let config = CodecConfig {
            buffer_size: 1024,
            max_record_len: 4096,
        };
        let mut reader = RecordReader::with_reader(io::repeat(b'a'), "endless", NUL, &config);
        assert!(matches!(reader.next(), Some(Err(ListError::Corrupt { .. }))));
        assert!(reader.carry.capacity() <= 2 * (config.max_record_len + config.buffer_size));
    }

    #[test]
    fn test_stream_records_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list");
        std::fs::write(&path, b"a\0b\0c").unwrap();

        let mut seen = Vec::new();
        let count = stream_records::<_, ListError>(&path, NUL, &small(), |r| {
            seen.push(r);
            Ok(())
        })
        .unwrap();

        assert_eq!(count, 3);
        assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RecordReader::open(&dir.path().join("missing"), NUL, &small()).err().unwrap();
        assert!(matches!(err, ListError::Io { .. }));
    }
}
