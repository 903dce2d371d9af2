//! Byte sinks and sources that every codec writes through.
//!
//! There are three backings for each direction:
//!
//! ```text
//! ByteSink                       ByteSource
//! ├── MemorySink (owned Vec)     ├── SliceSource (borrowed slice)
//! ├── FileSink (any Write)       ├── FileSource (any BufRead)
//! └── MemberSink (zip member)    └── MemberSource (zip member)
//! ```
//!
//! Sinks never return errors from individual writes. The first failure is
//! remembered, every later write becomes a no-op, and the failure surfaces
//! once when the sink is finished. Sources return an error on the first
//! short read, which is recoverable only when the source was put into safe
//! read mode.

mod file;
mod memory;
#[cfg(feature = "package")]
mod package;

pub use self::file::{FileSink, FileSource};
pub use self::memory::{MemorySink, SliceSource};
#[cfg(feature = "package")]
pub use self::package::{MemberSink, MemberSource, Package, PackageWriter};

use crate::{Error, ErrorKind};
use std::io::{self, Read};

/// Bytes read per step when a length comes from untrusted data
const READ_CHUNK: usize = 64 * 1024;

/// Destination of marshalled bytes
pub trait ByteSink {
    /// Append bytes. A no-op once the sink has failed.
    fn write(&mut self, data: &[u8]);

    /// Append a single byte
    #[inline]
    fn write_byte(&mut self, byte: u8) {
        self.write(&[byte])
    }

    /// Number of bytes accepted so far
    fn position(&self) -> u64;

    /// Whether a write has failed. Sticky.
    fn failed(&self) -> bool {
        false
    }
}

impl<T: ByteSink + ?Sized> ByteSink for &'_ mut T {
    #[inline]
    fn write(&mut self, data: &[u8]) {
        (**self).write(data)
    }

    #[inline]
    fn write_byte(&mut self, byte: u8) {
        (**self).write_byte(byte)
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn failed(&self) -> bool {
        (**self).failed()
    }
}

/// Origin of bytes to unmarshal
pub trait ByteSource {
    /// Fill the entire buffer or fail with a short read
    fn read_into(&mut self, buf: &mut [u8]) -> Result<(), Error>;

    /// Read a single byte
    #[inline]
    fn read_byte(&mut self) -> Result<u8, Error> {
        let mut buf = [0u8; 1];
        self.read_into(&mut buf)?;
        Ok(buf[0])
    }

    /// Read exactly `len` bytes into a new buffer.
    ///
    /// The buffer grows as data arrives, so a corrupted length fails with a
    /// short read instead of a huge allocation.
    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, Error> {
        let mut out = Vec::with_capacity(len.min(READ_CHUNK));
        let mut chunk = [0u8; 4096];
        while out.len() < len {
            let amt = (len - out.len()).min(chunk.len());
            self.read_into(&mut chunk[..amt])?;
            out.extend_from_slice(&chunk[..amt]);
        }
        Ok(out)
    }

    /// Discard `len` bytes without allocating a buffer for them
    fn skip(&mut self, len: usize) -> Result<(), Error> {
        let mut junk = [0u8; 128];
        let mut left = len;
        while left > 0 {
            let amt = left.min(junk.len());
            self.read_into(&mut junk[..amt])?;
            left -= amt;
        }
        Ok(())
    }

    /// Number of bytes consumed so far
    fn position(&self) -> u64;

    /// Whether short reads are reported as recoverable
    fn is_safe_read(&self) -> bool;

    /// Toggle safe read mode
    fn set_safe_read(&mut self, safe: bool);

    /// Whether every byte has been consumed
    fn is_exhausted(&mut self) -> Result<bool, Error>;
}

impl<T: ByteSource + ?Sized> ByteSource for &'_ mut T {
    #[inline]
    fn read_into(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        (**self).read_into(buf)
    }

    #[inline]
    fn read_byte(&mut self) -> Result<u8, Error> {
        (**self).read_byte()
    }

    fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, Error> {
        (**self).read_vec(len)
    }

    fn skip(&mut self, len: usize) -> Result<(), Error> {
        (**self).skip(len)
    }

    fn position(&self) -> u64 {
        (**self).position()
    }

    fn is_safe_read(&self) -> bool {
        (**self).is_safe_read()
    }

    fn set_safe_read(&mut self, safe: bool) {
        (**self).set_safe_read(safe)
    }

    fn is_exhausted(&mut self) -> Result<bool, Error> {
        (**self).is_exhausted()
    }
}

#[inline]
pub(crate) fn short_read(offset: u64, requested: usize, safe_read: bool) -> Error {
    Error::new(ErrorKind::ShortRead {
        offset,
        requested,
        recoverable: safe_read,
    })
}

/// Map an io failure from `read_exact` onto the error taxonomy
pub(crate) fn read_error(err: io::Error, offset: u64, requested: usize, safe_read: bool) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        short_read(offset, requested, safe_read)
    } else {
        Error::from(err)
    }
}

/// Fill `buf` from an io reader. `offset` advances by every byte consumed,
/// including the bytes of a read that comes up short, so the cursor stays
/// accurate when a safe read carries on past the failure.
pub(crate) fn read_counted<R: Read + ?Sized>(
    inner: &mut R,
    buf: &mut [u8],
    offset: &mut u64,
    safe_read: bool,
) -> Result<(), Error> {
    let start = *offset;
    let mut filled = 0;
    while filled < buf.len() {
        match inner.read(&mut buf[filled..]) {
            Ok(0) => return Err(short_read(start, buf.len(), safe_read)),
            Ok(n) => {
                filled += n;
                *offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(read_error(e, start, buf.len(), safe_read)),
        }
    }
    Ok(())
}

/// Bookkeeping shared by the io backed sinks: the cursor, the sticky
/// failure, and how that failure is surfaced.
#[derive(Debug)]
pub(crate) struct SinkState {
    name: String,
    offset: u64,
    failure: Option<io::Error>,
    ignore_errors: bool,
    finished: bool,
}

impl SinkState {
    pub(crate) fn new(name: String) -> Self {
        SinkState {
            name,
            offset: 0,
            failure: None,
            ignore_errors: false,
            finished: false,
        }
    }

    pub(crate) fn set_ignore_errors(&mut self, ignore: bool) {
        self.ignore_errors = ignore;
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn offset(&self) -> u64 {
        self.offset
    }

    pub(crate) fn failed(&self) -> bool {
        self.failure.is_some()
    }

    pub(crate) fn finished(&self) -> bool {
        self.finished
    }

    #[inline]
    pub(crate) fn write_with(&mut self, data: &[u8], f: impl FnOnce(&[u8]) -> io::Result<()>) {
        if self.failure.is_some() {
            return;
        }

        match f(data) {
            Ok(()) => self.offset += data.len() as u64,
            Err(e) => {
                log::debug!("write to {} failed at offset {}: {}", self.name, self.offset, e);
                self.failure = Some(e);
            }
        }
    }

    /// Record the final flush and surface the first failure
    pub(crate) fn finish(&mut self, flush: io::Result<()>) -> Result<(), Error> {
        self.finished = true;
        if let Err(e) = flush {
            self.failure.get_or_insert(e);
        }

        match self.failure.take() {
            Some(source) if !self.ignore_errors => Err(Error::new(ErrorKind::WriteFailed {
                name: self.name.clone(),
                source,
            })),
            Some(source) => {
                log::warn!("ignoring write failure on {}: {}", self.name, source);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// The sink is dropped without `finish`. Nobody is left to receive the
    /// error, so it is logged.
    pub(crate) fn abandon(&mut self, flush: io::Result<()>) {
        if self.finished {
            return;
        }

        if let Err(e) = self.finish(flush) {
            log::error!("{}", e);
        }
    }
}
