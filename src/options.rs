/// How members of a save package are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum PackageCompression {
    /// Members are stored as is
    Stored,

    /// Members are deflate compressed
    #[default]
    Deflated,
}

/// Knobs for a save or load operation
///
/// The defaults match a normal interactive save: write failures are
/// surfaced, short reads are fatal, and members are compressed.
///
/// ```rust
/// use tagsave::{PackageCompression, SaveOptions};
/// let options = SaveOptions::new()
///     .safe_read(true)
///     .compression(PackageCompression::Stored);
/// assert!(options.safe_read);
/// assert!(!options.ignore_write_errors);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SaveOptions {
    /// Log write failures instead of returning them when a sink is finished
    pub ignore_write_errors: bool,

    /// Report short reads as recoverable, for probing files that may not be
    /// saves at all
    pub safe_read: bool,

    /// Compression used for package members
    pub compression: PackageCompression,
}

impl SaveOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether write failures are ignored
    pub fn ignore_write_errors(mut self, ignore: bool) -> Self {
        self.ignore_write_errors = ignore;
        self
    }

    /// Set whether short reads are recoverable
    pub fn safe_read(mut self, safe: bool) -> Self {
        self.safe_read = safe;
        self
    }

    /// Set the package member compression
    pub fn compression(mut self, compression: PackageCompression) -> Self {
        self.compression = compression;
        self
    }
}
