use crate::{ByteSink, ByteSource, Error, ErrorKind};

/// Sentinel byte written between sections of a record
pub const CANARY: u8 = 0xAB;

/// Sentinel written at section boundaries. A reader that has drifted out of
/// step with the writer almost never lands on the sentinel, so a mismatch
/// stops decoding close to where the formats diverged.
///
/// ```rust
/// use tagsave::{Canary, MemorySink, SliceSource};
/// let mut sink = MemorySink::new();
/// Canary::mark(&mut sink);
/// assert_eq!(sink.as_slice(), &[171]);
///
/// let mut source = SliceSource::new(sink.as_slice());
/// assert!(Canary::expect(&mut source).is_ok());
/// assert!(Canary::expect(&mut SliceSource::new(&[0x00])).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Canary;

impl Canary {
    /// Write the sentinel
    #[inline]
    pub fn mark<W: ByteSink + ?Sized>(w: &mut W) {
        w.write_byte(CANARY)
    }

    /// Read one byte and fail unless it is the sentinel
    #[inline]
    pub fn expect<R: ByteSource + ?Sized>(r: &mut R) -> Result<(), Error> {
        let offset = r.position();
        match r.read_byte()? {
            CANARY => Ok(()),
            found => Err(Error::new(ErrorKind::CanaryMismatch { offset, found })),
        }
    }
}
