use super::{read_counted, ByteSink, ByteSource, SinkState};
use crate::{Error, ErrorKind, PackageCompression, SaveOptions};
use std::{
    fs::File,
    io::{BufRead, BufReader, BufWriter, Read, Seek, Write},
    path::Path,
};
use zip::{result::ZipError, write::SimpleFileOptions, CompressionMethod, ZipArchive, ZipWriter};

impl PackageCompression {
    fn method(self) -> CompressionMethod {
        match self {
            PackageCompression::Stored => CompressionMethod::Stored,
            PackageCompression::Deflated => CompressionMethod::Deflated,
        }
    }
}

/// Writes a save package: a zip archive of independently named members
///
/// ```rust
/// use tagsave::{Package, PackageWriter, ReadExt, WriteExt};
/// use std::io::Cursor;
///
/// let mut writer = PackageWriter::new(Cursor::new(Vec::new()), "demo");
/// let mut member = writer.member("you")?;
/// member.write_string("Ugluk");
/// member.finish()?;
/// let data = writer.finish()?.into_inner();
///
/// let mut package = Package::new(Cursor::new(data), "demo")?;
/// assert!(package.has_member("you"));
/// assert_eq!(package.member("you")?.read_string()?, "Ugluk");
/// # Ok::<(), tagsave::Error>(())
/// ```
pub struct PackageWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    name: String,
    compression: PackageCompression,
    ignore_errors: bool,
}

impl PackageWriter<BufWriter<File>> {
    /// Create (or truncate) a package at the given path
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        PackageWriter::create_with(path, &SaveOptions::default())
    }

    /// Create (or truncate) a package at the given path with options
    pub fn create_with<P: AsRef<Path>>(path: P, options: &SaveOptions) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::create(path)?;
        Ok(PackageWriter::with_options(
            BufWriter::new(file),
            path.display().to_string(),
            options,
        ))
    }
}

impl<W: Write + Seek> PackageWriter<W> {
    /// Start a package on the given writer
    pub fn new(inner: W, name: impl Into<String>) -> Self {
        PackageWriter::with_options(inner, name, &SaveOptions::default())
    }

    /// Start a package on the given writer with options
    pub fn with_options(inner: W, name: impl Into<String>, options: &SaveOptions) -> Self {
        PackageWriter {
            zip: ZipWriter::new(inner),
            name: name.into(),
            compression: options.compression,
            ignore_errors: options.ignore_write_errors,
        }
    }

    /// Open a new member for writing. Only one member can be written at a
    /// time.
    pub fn member(&mut self, name: &str) -> Result<MemberSink<'_, W>, Error> {
        let options = SimpleFileOptions::default().compression_method(self.compression.method());
        self.zip.start_file(name, options)?;
        log::debug!("{}: opened member {}", self.name, name);

        let mut state = SinkState::new(format!("{}:{}", self.name, name));
        state.set_ignore_errors(self.ignore_errors);
        Ok(MemberSink {
            zip: &mut self.zip,
            state,
        })
    }

    /// Write the archive directory and return the underlying writer
    pub fn finish(self) -> Result<W, Error> {
        let mut inner = self.zip.finish()?;
        inner.flush()?;
        Ok(inner)
    }
}

/// Sink writing to one member of a save package
pub struct MemberSink<'a, W: Write + Seek> {
    zip: &'a mut ZipWriter<W>,
    state: SinkState,
}

impl<W: Write + Seek> MemberSink<'_, W> {
    /// Name used in diagnostics (`package:member`)
    pub fn name(&self) -> &str {
        self.state.name()
    }

    /// Flush the member and surface the first failure
    pub fn finish(mut self) -> Result<(), Error> {
        let flush = self.zip.flush();
        log::debug!("{}: wrote {} bytes", self.state.name(), self.state.offset());
        self.state.finish(flush)
    }
}

impl<W: Write + Seek> ByteSink for MemberSink<'_, W> {
    #[inline]
    fn write(&mut self, data: &[u8]) {
        let zip = &mut *self.zip;
        self.state.write_with(data, |d| zip.write_all(d));
    }

    fn position(&self) -> u64 {
        self.state.offset()
    }

    fn failed(&self) -> bool {
        self.state.failed()
    }
}

impl<W: Write + Seek> Drop for MemberSink<'_, W> {
    fn drop(&mut self) {
        if !self.state.finished() {
            let flush = self.zip.flush();
            self.state.abandon(flush);
        }
    }
}

/// Reads members out of a save package
pub struct Package<R: Read + Seek = BufReader<File>> {
    zip: ZipArchive<R>,
    name: String,
    safe_read: bool,
}

impl Package<BufReader<File>> {
    /// Open the package at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Package::new(BufReader::new(file), path.display().to_string())
    }
}

impl<R: Read + Seek> Package<R> {
    /// Read the archive directory from the given reader
    pub fn new(reader: R, name: impl Into<String>) -> Result<Self, Error> {
        let zip = ZipArchive::new(reader)?;
        Ok(Package {
            zip,
            name: name.into(),
            safe_read: false,
        })
    }

    /// Members opened afterwards report short reads as recoverable
    pub fn with_safe_read(mut self, safe: bool) -> Self {
        self.safe_read = safe;
        self
    }

    /// Name used in diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The names of every member
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.zip.file_names()
    }

    /// Whether a member with the given name exists
    pub fn has_member(&self, name: &str) -> bool {
        self.zip.file_names().any(|x| x == name)
    }

    /// Open a member for reading
    pub fn member(&mut self, name: &str) -> Result<MemberSource<'_>, Error> {
        let entry = match self.zip.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => {
                return Err(Error::new(ErrorKind::MissingMember(name.to_string())))
            }
            Err(e) => return Err(Error::from(e)),
        };

        log::debug!("{}: opened member {} ({} bytes)", self.name, name, entry.size());
        let reader: Box<dyn Read + '_> = Box::new(entry);
        Ok(MemberSource {
            inner: BufReader::new(reader),
            name: format!("{}:{}", self.name, name),
            offset: 0,
            safe_read: self.safe_read,
        })
    }
}

/// Source reading one member of a save package
pub struct MemberSource<'a> {
    inner: BufReader<Box<dyn Read + 'a>>,
    name: String,
    offset: u64,
    safe_read: bool,
}

impl MemberSource<'_> {
    /// Name used in diagnostics (`package:member`)
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ByteSource for MemberSource<'_> {
    fn read_into(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        read_counted(&mut self.inner, buf, &mut self.offset, self.safe_read)
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
