//! Length prefixed chunks of save data.
//!
//! A tag is an i32 byte count followed by the payload. The payload is built
//! in memory first so the count is known before anything reaches the sink,
//! and on load it is read in one go so a decoder can never run past the end
//! of its own tag.

use crate::{
    ByteSink, ByteSource, DecodeContext, Error, ErrorKind, MemorySink, ReadExt, SliceSource,
    WriteExt,
};
use std::fmt;

/// The kinds of tag a save is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum TagId {
    /// Player state
    Player = 1,

    /// The current level
    Level = 2,

    /// Ghosts left behind by dead characters
    Ghost = 3,

    /// The character header shown by save browsers
    CharHeader = 4,
}

impl TagId {
    /// Every tag in id order
    pub const ALL: [TagId; 4] = [TagId::Player, TagId::Level, TagId::Ghost, TagId::CharHeader];

    /// The id as written to disk
    #[inline]
    pub const fn id(self) -> u8 {
        self as u8
    }

    pub const fn name(self) -> &'static str {
        match self {
            TagId::Player => "player",
            TagId::Level => "level",
            TagId::Ghost => "ghost",
            TagId::CharHeader => "character header",
        }
    }

    /// Newer builds may append fields to these tags, which older builds
    /// skip instead of rejecting
    #[inline]
    pub const fn is_append_only(self) -> bool {
        matches!(self, TagId::CharHeader)
    }
}

impl TryFrom<u8> for TagId {
    type Error = Error;

    fn try_from(tag_id: u8) -> Result<Self, Self::Error> {
        match tag_id {
            1 => Ok(TagId::Player),
            2 => Ok(TagId::Level),
            3 => Ok(TagId::Ghost),
            4 => Ok(TagId::CharHeader),
            _ => Err(Error::new(ErrorKind::UnknownTag { tag_id })),
        }
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds and consumes tag payloads
pub trait TagHandler {
    /// Write the payload of a tag. Writing nothing omits the tag.
    fn construct(&self, tag: TagId, w: &mut MemorySink);

    /// Decode a payload. Error offsets are relative to the payload start.
    fn read(&mut self, tag: TagId, r: &mut SliceSource<'_>, ctx: &DecodeContext)
        -> Result<(), Error>;
}

impl<T: TagHandler + ?Sized> TagHandler for &'_ mut T {
    fn construct(&self, tag: TagId, w: &mut MemorySink) {
        (**self).construct(tag, w)
    }

    fn read(
        &mut self,
        tag: TagId,
        r: &mut SliceSource<'_>,
        ctx: &DecodeContext,
    ) -> Result<(), Error> {
        (**self).read(tag, r, ctx)
    }
}

/// Construct a tag and write it to the sink. An empty payload writes
/// nothing at all.
///
/// # Panics
///
/// If the payload is larger than `i32::MAX` bytes
pub fn tag_write<H, W>(tag: TagId, handler: &H, w: &mut W)
where
    H: TagHandler + ?Sized,
    W: ByteSink + ?Sized,
{
    let mut buf = MemorySink::new();
    handler.construct(tag, &mut buf);
    if buf.is_empty() {
        log::debug!("{} tag is empty, skipping", tag);
        return;
    }

    let len = i32::try_from(buf.len()).expect("tag payload larger than i32::MAX bytes");
    log::debug!("writing {} tag ({} bytes)", tag, len);
    w.write_i32(len);
    w.write(buf.as_slice());
}

/// Read one tag from the source and hand its payload to the handler
///
/// The payload is read in full before decoding and inherits the source's
/// safe read mode. A decoder that leaves bytes unread fails with
/// [ErrorKind::TrailingData] unless the tag is
/// [append only](TagId::is_append_only).
pub fn tag_read<R, H>(r: &mut R, tag: TagId, handler: &mut H, ctx: &DecodeContext) -> Result<(), Error>
where
    R: ByteSource + ?Sized,
    H: TagHandler + ?Sized,
{
    let offset = r.position();
    let len = r.read_i32()?;
    let len = usize::try_from(len).map_err(|_| {
        Error::new(ErrorKind::InvalidLength {
            offset,
            len: i64::from(len),
        })
    })?;

    let data = r.read_vec(len)?;
    log::debug!("read {} tag ({} bytes, version {})", tag, len, ctx.version());

    let mut payload = SliceSource::new(&data).with_safe_read(r.is_safe_read());
    handler.read(tag, &mut payload, ctx)?;

    let remaining = payload.remaining();
    if remaining == 0 {
        Ok(())
    } else if tag.is_append_only() {
        log::warn!(
            "skipped {} unknown trailing bytes in {} tag",
            remaining,
            tag
        );
        Ok(())
    } else {
        Err(Error::new(ErrorKind::TrailingData { tag, remaining }))
    }
}

/// [tag_read] for a tag id that came from untrusted data
pub fn tag_read_raw<R, H>(
    r: &mut R,
    tag_id: u8,
    handler: &mut H,
    ctx: &DecodeContext,
) -> Result<TagId, Error>
where
    R: ByteSource + ?Sized,
    H: TagHandler + ?Sized,
{
    let tag = TagId::try_from(tag_id)?;
    tag_read(r, tag, handler, ctx)?;
    Ok(tag)
}
