use super::{read_counted, read_error, ByteSink, ByteSource, SinkState};
use crate::{Error, SaveOptions};
use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::Path,
};

/// Sink writing to a file (or any other [Write] implementation)
///
/// Call [FileSink::finish] to flush and learn whether every write made it to
/// disk. A sink dropped without finishing still flushes, but can only log a
/// failure.
#[derive(Debug)]
pub struct FileSink<W: Write = BufWriter<File>> {
    inner: W,
    state: SinkState,
}

impl FileSink<BufWriter<File>> {
    /// Create (or truncate) the file at the given path
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        FileSink::create_with(path, &SaveOptions::default())
    }

    /// Create (or truncate) the file at the given path with options
    pub fn create_with<P: AsRef<Path>>(path: P, options: &SaveOptions) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::create(path)?;
        let sink = FileSink::new(BufWriter::new(file), path.display().to_string())
            .ignore_errors(options.ignore_write_errors);
        Ok(sink)
    }
}

impl<W: Write> FileSink<W> {
    /// Wrap a writer. The name is only used in diagnostics.
    pub fn new(inner: W, name: impl Into<String>) -> Self {
        FileSink {
            inner,
            state: SinkState::new(name.into()),
        }
    }

    /// When set, a write failure is logged rather than returned from
    /// [FileSink::finish]
    pub fn ignore_errors(mut self, ignore: bool) -> Self {
        self.state.set_ignore_errors(ignore);
        self
    }

    /// Name used in diagnostics
    pub fn name(&self) -> &str {
        self.state.name()
    }

    /// Flush pending writes and surface the first failure
    pub fn finish(mut self) -> Result<(), Error> {
        let flush = self.inner.flush();
        self.state.finish(flush)
    }
}

impl<W: Write> ByteSink for FileSink<W> {
    #[inline]
    fn write(&mut self, data: &[u8]) {
        let inner = &mut self.inner;
        self.state.write_with(data, |d| inner.write_all(d));
    }

    fn position(&self) -> u64 {
        self.state.offset()
    }

    fn failed(&self) -> bool {
        self.state.failed()
    }
}

impl<W: Write> Drop for FileSink<W> {
    fn drop(&mut self) {
        if !self.state.finished() {
            let flush = self.inner.flush();
            self.state.abandon(flush);
        }
    }
}

/// Source reading from a file (or any other [BufRead] implementation)
#[derive(Debug)]
pub struct FileSource<R: BufRead = BufReader<File>> {
    inner: R,
    name: String,
    offset: u64,
    safe_read: bool,
}

impl FileSource<BufReader<File>> {
    /// Open the file at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Ok(FileSource::new(
            BufReader::new(file),
            path.display().to_string(),
        ))
    }
}

impl<R: BufRead> FileSource<R> {
    /// Wrap a reader. The name is only used in diagnostics.
    pub fn new(inner: R, name: impl Into<String>) -> Self {
        FileSource {
            inner,
            name: name.into(),
            offset: 0,
            safe_read: false,
        }
    }

    /// Set whether short reads are recoverable
    pub fn with_safe_read(mut self, safe: bool) -> Self {
        self.safe_read = safe;
        self
    }

    /// Name used in diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the underlying reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: BufRead> ByteSource for FileSource<R> {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        read_counted(&mut self.inner, buf, &mut self.offset, self.safe_read)
    }

    fn skip(&mut self, len: usize) -> Result<(), Error> {
        let mut left = len;
        while left > 0 {
            let available = match self.inner.fill_buf() {
                Ok(data) => data.len(),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::from(e)),
            };

            if available == 0 {
                let err = io::Error::from(io::ErrorKind::UnexpectedEof);
                return Err(read_error(err, self.offset, left, self.safe_read));
            }

            let amt = available.min(left);
            self.inner.consume(amt);
            self.offset += amt as u64;
            left -= amt;
        }
        Ok(())
    }

    fn position(&self) -> u64 {
        self.offset
    }

    fn is_safe_read(&self) -> bool {
        self.safe_read
    }

    fn set_safe_read(&mut self, safe: bool) {
        self.safe_read = safe;
    }

    fn is_exhausted(&mut self) -> Result<bool, Error> {
        Ok(self.inner.fill_buf()?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, ReadExt, WriteExt};
    use std::io::Cursor;

    /// Accepts `limit` bytes and then reports a full disk
    struct FullDisk {
        written: Vec<u8>,
        limit: usize,
    }

    impl Write for FullDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.written.len() + buf.len() > self.limit {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_sticky() {
        let disk = FullDisk {
            written: Vec::new(),
            limit: 4,
        };
        let mut sink = FileSink::new(disk, "full.sav");
        sink.write_i32(1);
        assert!(!sink.failed());
        sink.write_i16(2);
        assert!(sink.failed());
        sink.write_byte(3);
        assert_eq!(sink.position(), 4);

        let err = sink.finish().unwrap_err();
        match err.kind() {
            ErrorKind::WriteFailed { name, .. } => assert_eq!(name, "full.sav"),
            x => panic!("unexpected error: {:?}", x),
        }
    }

    #[test]
    fn test_write_failure_ignored() {
        let disk = FullDisk {
            written: Vec::new(),
            limit: 0,
        };
        let mut sink = FileSink::new(disk, "full.sav").ignore_errors(true);
        sink.write_byte(1);
        assert!(sink.failed());
        assert!(sink.finish().is_ok());
    }

    #[test]
    fn test_skip_without_buffering_everything() {
        let data: Vec<u8> = (0..=255u8).collect();
        let mut source = FileSource::new(Cursor::new(data), "mem");
        source.skip(200).unwrap();
        assert_eq!(source.read_u8().unwrap(), 200);
        assert_eq!(source.position(), 201);

        let err = source.skip(100).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ShortRead { .. }));
    }

    #[test]
    fn test_partial_read_advances_position() {
        let mut source = FileSource::new(Cursor::new(vec![0xab, 1, 2, 3]), "short")
            .with_safe_read(true);
        assert_eq!(source.read_u8().unwrap(), 0xab);

        let err = source.read_i32().unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::ShortRead {
                offset: 1,
                requested: 4,
                recoverable: true
            }
        ));
        assert_eq!(source.position(), 4);

        let err = source.read_u8().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ShortRead { offset: 4, .. }));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.bin");

        let mut sink = FileSink::create(&path).unwrap();
        sink.write_string("hello");
        sink.write_unsigned(300);
        sink.finish().unwrap();

        let mut source = FileSource::open(&path).unwrap();
        assert_eq!(source.read_string().unwrap(), "hello");
        assert_eq!(source.read_unsigned().unwrap(), 300);
        assert!(source.is_exhausted().unwrap());
    }
}
