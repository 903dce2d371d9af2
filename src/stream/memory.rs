use super::{short_read, ByteSink, ByteSource};
use crate::Error;

/// Sink that accumulates bytes into an owned buffer
///
/// Writes to memory never fail, so there is nothing to finish.
///
/// ```rust
/// use tagsave::{MemorySink, WriteExt};
/// let mut sink = MemorySink::new();
/// sink.write_i16(-2);
/// assert_eq!(sink.as_slice(), &[0xff, 0xfe]);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemorySink {
    buf: Vec<u8>,
}

impl MemorySink {
    /// Creates an empty memory sink
    pub fn new() -> Self {
        MemorySink { buf: Vec::new() }
    }

    /// Creates an empty memory sink with preallocated space
    pub fn with_capacity(capacity: usize) -> Self {
        MemorySink {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// The bytes written so far
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Number of bytes written
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Drop all written data while keeping the allocation
    pub fn clear(&mut self) {
        self.buf.clear()
    }

    /// Take the written bytes
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl ByteSink for MemorySink {
    #[inline]
    fn write(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    #[inline]
    fn write_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    fn position(&self) -> u64 {
        self.buf.len() as u64
    }
}

impl From<Vec<u8>> for MemorySink {
    fn from(buf: Vec<u8>) -> Self {
        MemorySink { buf }
    }
}

/// Source that reads from a borrowed byte slice
///
/// ```rust
/// use tagsave::{ByteSource, ReadExt, SliceSource};
/// let mut source = SliceSource::new(&[0x00, 0x2a, 0x01]);
/// assert_eq!(source.read_i16().unwrap(), 42);
/// assert_eq!(source.remaining(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    data: &'a [u8],
    offset: usize,
    safe_read: bool,
}

impl<'a> SliceSource<'a> {
    /// Creates a source over the given data
    pub fn new(data: &'a [u8]) -> Self {
        SliceSource {
            data,
            offset: 0,
            safe_read: false,
        }
    }

    /// Set whether short reads are recoverable
    pub fn with_safe_read(mut self, safe: bool) -> Self {
        self.safe_read = safe;
        self
    }

    /// Number of unread bytes
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// The unread bytes
    pub fn rest(&self) -> &'a [u8] {
        &self.data[self.offset..]
    }

    /// Advance `len` bytes and return them without copying
    #[inline]
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], Error> {
        if len > self.remaining() {
            return Err(short_read(self.offset as u64, len, self.safe_read));
        }

        let start = self.offset;
        self.offset += len;
        Ok(&self.data[start..self.offset])
    }
}

impl ByteSource for SliceSource<'_> {
    #[inline]
    fn read_into(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        let data = self.read_slice(buf.len())?;
        buf.copy_from_slice(data);
        Ok(())
    }

    #[inline]
    fn read_byte(&mut self) -> Result<u8, Error> {
        match self.data.get(self.offset) {
            Some(&b) => {
                self.offset += 1;
                Ok(b)
            }
            None => Err(short_read(self.offset as u64, 1, self.safe_read)),
        }
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, Error> {
        self.read_slice(len).map(|x| x.to_vec())
    }

    fn skip(&mut self, len: usize) -> Result<(), Error> {
        self.read_slice(len).map(|_| ())
    }

    fn position(&self) -> u64 {
        self.offset as u64
    }

    fn is_safe_read(&self) -> bool {
        self.safe_read
    }

    fn set_safe_read(&mut self, safe: bool) {
        self.safe_read = safe;
    }

    fn is_exhausted(&mut self) -> Result<bool, Error> {
        Ok(self.remaining() == 0)
    }
}
