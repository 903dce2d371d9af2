use crate::{tag::TagId, version::SaveVersion};
use std::fmt;

/// An error that can occur when saving or loading data
#[derive(Debug)]
pub struct Error(Box<ErrorKind>);

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Error {
        Error(Box::new(kind))
    }

    /// Return the specific type of error
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Consume the error and return the specific type of error
    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    /// Returns the byte offset that the error occurs (if available)
    pub fn offset(&self) -> Option<u64> {
        self.0.offset()
    }

    /// Returns false only for short reads raised while the source was in
    /// safe read mode. Those are expected when probing unknown files and the
    /// caller may carry on.
    ///
    /// ```rust
    /// use tagsave::{ByteSource, ReadExt, SliceSource};
    /// let mut source = SliceSource::new(&[0x01]);
    /// assert!(source.read_i16().unwrap_err().is_fatal());
    ///
    /// let mut source = SliceSource::new(&[0x01]).with_safe_read(true);
    /// assert!(!source.read_i16().unwrap_err().is_fatal());
    /// ```
    pub fn is_fatal(&self) -> bool {
        !matches!(
            *self.0,
            ErrorKind::ShortRead {
                recoverable: true,
                ..
            }
        )
    }

    /// The data is structurally valid but from a save format revision this
    /// build does not load.
    pub fn is_version_mismatch(&self) -> bool {
        matches!(
            *self.0,
            ErrorKind::AncientSave(_)
                | ErrorKind::FutureSave(_)
                | ErrorKind::InvalidVersion(_)
                | ErrorKind::IncompatibleBones(_)
                | ErrorKind::UnsupportedFormat { .. }
        )
    }

    /// The data is truncated, garbled, or not a save at all.
    pub fn is_corruption(&self) -> bool {
        matches!(
            *self.0,
            ErrorKind::ShortRead { .. }
                | ErrorKind::CanaryMismatch { .. }
                | ErrorKind::UnknownTag { .. }
                | ErrorKind::InvalidLength { .. }
                | ErrorKind::InvalidString { .. }
                | ErrorKind::VarintOverflow { .. }
                | ErrorKind::InvalidRun { .. }
                | ErrorKind::GridDimensions { .. }
                | ErrorKind::TrailingData { .. }
                | ErrorKind::InvalidRecord(_)
                | ErrorKind::MissingMember(_)
        )
    }
}

/// Specific type of error
#[derive(Debug)]
pub enum ErrorKind {
    /// Fewer bytes were available than requested
    ShortRead {
        offset: u64,
        requested: usize,
        recoverable: bool,
    },

    /// A canary byte was not where the writer put it
    CanaryMismatch { offset: u64, found: u8 },

    /// A tag id outside of the known tag set
    UnknownTag { tag_id: u8 },

    /// A length or count prefix was negative
    InvalidLength { offset: u64, len: i64 },

    /// A string was not valid UTF-8
    InvalidString { offset: u64 },

    /// A variable length integer carried more than 64 bits
    VarintOverflow { offset: u64 },

    /// A run length record was empty or ran past the end of the grid
    InvalidRun { offset: u64, run: u8 },

    /// A grid section had unexpected dimensions
    GridDimensions {
        expected: (usize, usize),
        found: (usize, usize),
    },

    /// A tag payload was not fully consumed by its decoder
    TrailingData { tag: TagId, remaining: usize },

    /// A record held values that make it impossible to decode further
    InvalidRecord(String),

    /// The frozen character header uses a newer format than this build
    UnsupportedFormat { format: u8 },

    /// The save's major version predates what this build loads
    AncientSave(SaveVersion),

    /// The save was written by a newer build
    FutureSave(SaveVersion),

    /// The save carries a nonsensical version
    InvalidVersion(SaveVersion),

    /// A bones file whose version is not transplantable into this build
    IncompatibleBones(SaveVersion),

    /// A file or archive sink could not persist the data
    WriteFailed {
        name: String,
        source: std::io::Error,
    },

    /// A named member is absent from the save package
    MissingMember(String),

    /// An IO error
    Io(std::io::Error),

    /// The save package archive could not be processed
    #[cfg(feature = "package")]
    Archive(zip::result::ZipError),
}

impl ErrorKind {
    pub fn offset(&self) -> Option<u64> {
        match *self {
            ErrorKind::ShortRead { offset, .. } => Some(offset),
            ErrorKind::CanaryMismatch { offset, .. } => Some(offset),
            ErrorKind::InvalidLength { offset, .. } => Some(offset),
            ErrorKind::InvalidString { offset } => Some(offset),
            ErrorKind::VarintOverflow { offset } => Some(offset),
            ErrorKind::InvalidRun { offset, .. } => Some(offset),
            _ => None,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self.0 {
            ErrorKind::WriteFailed { ref source, .. } => Some(source),
            ErrorKind::Io(ref err) => Some(err),
            #[cfg(feature = "package")]
            ErrorKind::Archive(ref err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self.0 {
            ErrorKind::ShortRead {
                offset, requested, ..
            } => write!(
                f,
                "short read while reading save (requested: {}, offset: {})",
                requested, offset
            ),
            ErrorKind::CanaryMismatch { offset, found } => write!(
                f,
                "save corrupted: canary gone (found: 0x{:02x}, offset: {})",
                found, offset
            ),
            ErrorKind::UnknownTag { tag_id } => write!(f, "unknown tag type: {}", tag_id),
            ErrorKind::InvalidLength { offset, len } => {
                write!(f, "invalid length prefix {} (offset: {})", len, offset)
            }
            ErrorKind::InvalidString { offset } => {
                write!(f, "string is not valid utf-8 (offset: {})", offset)
            }
            ErrorKind::VarintOverflow { offset } => {
                write!(f, "variable length integer overflows 64 bits (offset: {})", offset)
            }
            ErrorKind::InvalidRun { offset, run } => write!(
                f,
                "invalid run length {} in run length encoded grid (offset: {})",
                run, offset
            ),
            ErrorKind::GridDimensions { expected, found } => write!(
                f,
                "grid is {}x{} but expected {}x{}",
                found.0, found.1, expected.0, expected.1
            ),
            ErrorKind::TrailingData { tag, remaining } => write!(
                f,
                "incomplete read of {} tag ({} bytes left over)",
                tag.name(),
                remaining
            ),
            ErrorKind::InvalidRecord(ref msg) => write!(f, "save corrupted: {}", msg),
            ErrorKind::UnsupportedFormat { format } => {
                write!(f, "unsupported character header format: {}", format)
            }
            ErrorKind::AncientSave(version) => write!(
                f,
                "save version {} is too old to be loaded by this build",
                version
            ),
            ErrorKind::FutureSave(version) => write!(
                f,
                "save version {} was written by a newer build",
                version
            ),
            ErrorKind::InvalidVersion(version) => write!(f, "invalid save version {}", version),
            ErrorKind::IncompatibleBones(version) => {
                write!(f, "bones file version {} is incompatible", version)
            }
            ErrorKind::WriteFailed { ref name, ref source } => {
                write!(f, "error writing to {}: {}", name, source)
            }
            ErrorKind::MissingMember(ref name) => {
                write!(f, "save package is missing the {} member", name)
            }
            ErrorKind::Io(ref err) => write!(f, "io error: {}", err),
            #[cfg(feature = "package")]
            ErrorKind::Archive(ref err) => write!(f, "archive error: {}", err),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::new(ErrorKind::Io(error))
    }
}

#[cfg(feature = "package")]
impl From<zip::result::ZipError> for Error {
    fn from(error: zip::result::ZipError) -> Self {
        Error::new(ErrorKind::Archive(error))
    }
}
