//! Save format revisions and the compatibility rules between them.
//!
//! A save is stamped with a `(major, minor)` pair. Crossing a major version
//! invalidates every save written before it. Minor versions come and go
//! within a major: each new field is gated on the minor that introduced it
//! so older saves keep loading.

use crate::{ByteSink, ByteSource, Error, ErrorKind, ReadExt, WriteExt};
use std::fmt;

/// Format of the character header. Bumping it hides every existing save
/// from older save browsers, so it stays put across major versions.
pub const TAG_CHR_FORMAT: u8 = 0;

/// Current major version. Saves with a lower major are ancient.
pub const TAG_MAJOR_VERSION: i32 = 35;

/// Minor revisions of the current major version. Reset to `Reset` whenever
/// the major version changes. Marshalled as a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(i32)]
pub enum TagMinor {
    /// Minor tags were reset
    Reset = 0,

    /// Player state records the spell library
    SpellLibrary = 1,

    /// Levels record their monster density
    LevelDensity = 2,

    /// Ghosts record whether they fly
    GhostFlies = 3,

    /// The character header records the dungeon depth
    CharDepth = 4,
}

impl TagMinor {
    /// Every minor revision in order
    pub const ALL: [TagMinor; 5] = [
        TagMinor::Reset,
        TagMinor::SpellLibrary,
        TagMinor::LevelDensity,
        TagMinor::GhostFlies,
        TagMinor::CharDepth,
    ];

    /// The numeric minor version
    #[inline]
    pub const fn value(self) -> i32 {
        self as i32
    }
}

impl From<TagMinor> for i32 {
    fn from(minor: TagMinor) -> Self {
        minor.value()
    }
}

/// Current minor version
pub const TAG_MINOR_VERSION: i32 = TagMinor::CharDepth.value();

/// Minor revisions that change the layout of ghost records. Save compat
/// work that touches ghosts must be listed here as well so bones files
/// stay transplantable between builds.
pub const BONES_MINOR_TAGS: &[TagMinor] = &[TagMinor::Reset, TagMinor::GhostFlies];

/// A `(major, minor)` save format revision
///
/// Ordering is lexicographic.
///
/// ```rust
/// use tagsave::SaveVersion;
/// let current = SaveVersion::current();
/// assert!(current.is_compatible());
/// assert!(SaveVersion::new(current.major() - 1, 200).is_ancient());
/// assert!(SaveVersion::new(current.major(), current.minor() + 1).is_future());
/// assert!(SaveVersion::new(33, 99) < SaveVersion::new(34, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SaveVersion {
    major: i32,
    minor: i32,
}

impl Default for SaveVersion {
    fn default() -> Self {
        SaveVersion::INVALID
    }
}

impl SaveVersion {
    /// A version no build ever writes
    pub const INVALID: SaveVersion = SaveVersion::new(-1, -1);

    /// Creates a version from its parts
    #[inline]
    pub const fn new(major: i32, minor: i32) -> Self {
        SaveVersion { major, minor }
    }

    /// The version this build writes
    #[inline]
    pub const fn current() -> Self {
        SaveVersion::new(TAG_MAJOR_VERSION, TAG_MINOR_VERSION)
    }

    /// The version this build stamps on bones files: the newest minor that
    /// affected ghost records
    pub fn current_bones() -> Self {
        let minor = BONES_MINOR_TAGS
            .iter()
            .map(|x| x.value())
            .max()
            .unwrap_or(0);
        SaveVersion::new(TAG_MAJOR_VERSION, minor)
    }

    /// The major version
    #[inline]
    pub const fn major(&self) -> i32 {
        self.major
    }

    /// The minor version
    #[inline]
    pub const fn minor(&self) -> i32 {
        self.minor
    }

    /// Both parts are in range
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.major > 0 && self.minor > -1
    }

    /// Written by a newer build
    pub fn is_future(&self) -> bool {
        self.is_valid() && *self > SaveVersion::current()
    }

    /// Written by an older build
    pub fn is_past(&self) -> bool {
        self.is_valid() && *self < SaveVersion::current()
    }

    /// Written before the current major version
    pub fn is_ancient(&self) -> bool {
        self.is_valid() && self.major < TAG_MAJOR_VERSION
    }

    /// Loadable by this build
    pub fn is_compatible(&self) -> bool {
        self.is_valid() && !self.is_ancient() && !self.is_future()
    }

    /// Exactly what this build writes
    pub fn is_current(&self) -> bool {
        self.is_valid() && *self == SaveVersion::current()
    }

    /// Ghost records of this version can be transplanted into this build
    pub fn is_bones_version(&self) -> bool {
        self.is_compatible() && BONES_MINOR_TAGS.iter().any(|x| x.value() == self.minor)
    }

    /// The field gate `major > X || (major == X && minor >= Y)`
    #[inline]
    pub fn at_least(&self, major: i32, minor: i32) -> bool {
        *self >= SaveVersion::new(major, minor)
    }

    /// Fail with the matching error kind unless game state of this version
    /// can be loaded
    pub fn check_loadable(&self) -> Result<(), Error> {
        if !self.is_valid() {
            Err(Error::new(ErrorKind::InvalidVersion(*self)))
        } else if self.is_ancient() {
            Err(Error::new(ErrorKind::AncientSave(*self)))
        } else if self.is_future() {
            Err(Error::new(ErrorKind::FutureSave(*self)))
        } else {
            Ok(())
        }
    }

    /// Fail unless ghost records of this version can be loaded
    pub fn check_bones(&self) -> Result<(), Error> {
        if self.is_bones_version() {
            Ok(())
        } else {
            Err(Error::new(ErrorKind::IncompatibleBones(*self)))
        }
    }

    /// Write the version as two unsigned bytes
    ///
    /// # Panics
    ///
    /// If either part does not fit in a byte
    pub fn marshal_header<W: ByteSink + ?Sized>(&self, w: &mut W) {
        let major = u8::try_from(self.major).expect("major version must fit in a byte");
        let minor = u8::try_from(self.minor).expect("minor version must fit in a byte");
        w.write_u8(major);
        w.write_u8(minor);
    }

    /// Read a version written by [SaveVersion::marshal_header]. Any value is
    /// accepted so saves from other builds can at least be listed.
    pub fn unmarshal_header<R: ByteSource + ?Sized>(r: &mut R) -> Result<Self, Error> {
        let major = r.read_u8()?;
        let minor = r.read_u8()?;
        Ok(SaveVersion::new(i32::from(major), i32::from(minor)))
    }
}

impl fmt::Display for SaveVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// State threaded through every decode call
///
/// Decoders consult the version of the data being read to decide which
/// optional fields are present.
///
/// ```rust
/// use tagsave::{DecodeContext, SaveVersion, TagMinor};
/// let ctx = DecodeContext::new(SaveVersion::new(34, 1));
/// assert!(ctx.has_minor(TagMinor::SpellLibrary));
/// assert!(!ctx.has_minor(TagMinor::LevelDensity));
/// assert!(ctx.at_least(32, 27));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeContext {
    version: SaveVersion,
}

impl DecodeContext {
    /// Context for data of the given version
    pub const fn new(version: SaveVersion) -> Self {
        DecodeContext { version }
    }

    /// Context for data written by this build
    pub const fn current() -> Self {
        DecodeContext::new(SaveVersion::current())
    }

    /// Version of the data being decoded
    #[inline]
    pub fn version(&self) -> SaveVersion {
        self.version
    }

    /// See [SaveVersion::at_least]
    #[inline]
    pub fn at_least(&self, major: i32, minor: i32) -> bool {
        self.version.at_least(major, minor)
    }

    /// Whether a minor revision of the current major is present
    #[inline]
    pub fn has_minor(&self, minor: impl Into<i32>) -> bool {
        self.version.at_least(TAG_MAJOR_VERSION, minor.into())
    }
}

impl Default for DecodeContext {
    fn default() -> Self {
        DecodeContext::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySink, SliceSource};
    use rstest::*;

    #[test]
    fn test_minor_versions_are_dense() {
        for (i, minor) in TagMinor::ALL.iter().enumerate() {
            assert_eq!(minor.value(), i as i32);
        }
        assert_eq!(TagMinor::ALL.last().map(|x| x.value()), Some(TAG_MINOR_VERSION));
        assert!(TAG_MINOR_VERSION <= 0xff);
    }

    #[rstest]
    #[case(SaveVersion::current(), true, false, false, true)]
    #[case(SaveVersion::new(TAG_MAJOR_VERSION, 0), true, false, false, false)]
    #[case(SaveVersion::new(TAG_MAJOR_VERSION - 1, 250), false, true, false, false)]
    #[case(SaveVersion::new(TAG_MAJOR_VERSION, TAG_MINOR_VERSION + 1), false, false, true, false)]
    #[case(SaveVersion::new(TAG_MAJOR_VERSION + 1, 0), false, false, true, false)]
    #[case(SaveVersion::INVALID, false, false, false, false)]
    #[case(SaveVersion::new(0, 0), false, false, false, false)]
    fn test_predicates(
        #[case] version: SaveVersion,
        #[case] compatible: bool,
        #[case] ancient: bool,
        #[case] future: bool,
        #[case] current: bool,
    ) {
        assert_eq!(version.is_compatible(), compatible);
        assert_eq!(version.is_ancient(), ancient);
        assert_eq!(version.is_future(), future);
        assert_eq!(version.is_current(), current);
    }

    #[test]
    fn test_check_loadable() {
        let err = SaveVersion::new(TAG_MAJOR_VERSION - 1, 3)
            .check_loadable()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::AncientSave(_)));

        let err = SaveVersion::new(TAG_MAJOR_VERSION, TAG_MINOR_VERSION + 1)
            .check_loadable()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::FutureSave(_)));

        let err = SaveVersion::default().check_loadable().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidVersion(_)));

        assert!(SaveVersion::current().check_loadable().is_ok());
    }

    #[test]
    fn test_bones_versions() {
        let bones = SaveVersion::current_bones();
        assert_eq!(bones, SaveVersion::new(TAG_MAJOR_VERSION, TagMinor::GhostFlies.value()));
        assert!(bones.is_bones_version());
        assert!(SaveVersion::new(TAG_MAJOR_VERSION, 0).is_bones_version());

        // Compatible as a save, but ghosts never changed at this minor
        let version = SaveVersion::new(TAG_MAJOR_VERSION, TagMinor::LevelDensity.value());
        assert!(version.is_compatible());
        assert!(!version.is_bones_version());
        assert!(version.check_bones().is_err());
    }

    #[test]
    fn test_header_tolerates_any_version() {
        let data = [200u8, 255u8];
        let version = SaveVersion::unmarshal_header(&mut SliceSource::new(&data)).unwrap();
        assert_eq!(version, SaveVersion::new(200, 255));
        assert!(version.is_future());

        let mut sink = MemorySink::new();
        version.marshal_header(&mut sink);
        assert_eq!(sink.as_slice(), &data);
    }

    #[rstest]
    #[case(SaveVersion::new(33, 0), 32, 27, true)]
    #[case(SaveVersion::new(32, 27), 32, 27, true)]
    #[case(SaveVersion::new(32, 26), 32, 27, false)]
    #[case(SaveVersion::new(31, 99), 32, 27, false)]
    fn test_gate(
        #[case] version: SaveVersion,
        #[case] major: i32,
        #[case] minor: i32,
        #[case] expected: bool,
    ) {
        assert_eq!(DecodeContext::new(version).at_least(major, minor), expected);
    }
}
