//! Save packages: a game in progress spread over the members of a zip
//! archive.
//!
//! ```text
//! chr  [major u8][minor u8][character header tag]
//! you  [player tag]
//! lvl  [level tag][ghost tag, only when ghosts are present]
//! ```
//!
//! The `chr` member is frozen: its layout only ever grows at the end so a
//! browser can list saves from builds that are far older or newer than
//! itself.

use crate::{
    tag_read, tag_write, ByteSource, CharHeader, DecodeContext, Error, ErrorKind, GameState,
    MemberSource, Package, PackageWriter, SaveOptions, SaveVersion, TagHandler, TagId,
};
use std::{
    io::{Read, Seek, Write},
    path::Path,
};

/// Name of the member holding the version and the character header
pub const CHR_MEMBER: &str = "chr";

/// Name of the member holding the player
pub const PLAYER_MEMBER: &str = "you";

/// Name of the member holding the current level
pub const LEVEL_MEMBER: &str = "lvl";

/// What a save browser shows about a save without loading it
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SaveSummary {
    pub version: SaveVersion,
    pub header: CharHeader,
}

impl SaveSummary {
    /// Whether this build can load the game
    pub fn is_loadable(&self) -> bool {
        self.version.is_compatible()
    }
}

/// Fails with [ErrorKind::TrailingData] if the member holds anything after
/// its last tag
fn ensure_consumed(member: &mut MemberSource<'_>, last: TagId) -> Result<(), Error> {
    let mut remaining = 0;
    while !member.is_exhausted()? {
        member.skip(1)?;
        remaining += 1;
    }

    if remaining == 0 {
        Ok(())
    } else {
        log::debug!("{}: {} bytes after the {} tag", member.name(), remaining, last);
        Err(Error::new(ErrorKind::TrailingData {
            tag: last,
            remaining,
        }))
    }
}

fn read_member<R, H>(
    package: &mut Package<R>,
    name: &str,
    tag: TagId,
    handler: &mut H,
    ctx: &DecodeContext,
) -> Result<(), Error>
where
    R: Read + Seek,
    H: TagHandler + ?Sized,
{
    let mut member = package.member(name)?;
    tag_read(&mut member, tag, handler, ctx)?;
    ensure_consumed(&mut member, tag)
}

impl GameState {
    /// Write every member of the save. The writer's options decide whether
    /// failures are surfaced.
    ///
    /// ```rust
    /// use tagsave::{GameState, Package, PackageWriter};
    /// use std::io::Cursor;
    ///
    /// let mut game = GameState::default();
    /// game.header.name = String::from("Ugluk");
    ///
    /// let mut writer = PackageWriter::new(Cursor::new(Vec::new()), "ugluk.zip");
    /// game.write_save(&mut writer)?;
    /// let data = writer.finish()?.into_inner();
    ///
    /// let mut package = Package::new(Cursor::new(data), "ugluk.zip")?;
    /// assert_eq!(GameState::read_save(&mut package)?, game);
    /// # Ok::<(), tagsave::Error>(())
    /// ```
    pub fn write_save<W: Write + Seek>(&self, package: &mut PackageWriter<W>) -> Result<(), Error> {
        let mut chr = package.member(CHR_MEMBER)?;
        SaveVersion::current().marshal_header(&mut chr);
        tag_write(TagId::CharHeader, self, &mut chr);
        chr.finish()?;

        let mut you = package.member(PLAYER_MEMBER)?;
        tag_write(TagId::Player, self, &mut you);
        you.finish()?;

        let mut lvl = package.member(LEVEL_MEMBER)?;
        tag_write(TagId::Level, self, &mut lvl);
        tag_write(TagId::Ghost, self, &mut lvl);
        lvl.finish()
    }

    /// Write the save to a new package at the given path
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P, options: &SaveOptions) -> Result<(), Error> {
        let mut writer = PackageWriter::create_with(path, options)?;
        self.write_save(&mut writer)?;
        writer.finish()?;
        Ok(())
    }

    /// Load a game. The version is checked before anything else is decoded,
    /// so saves from other builds fail with a version error rather than a
    /// corruption error.
    pub fn read_save<R: Read + Seek>(package: &mut Package<R>) -> Result<GameState, Error> {
        let mut game = GameState::default();

        let mut chr = package.member(CHR_MEMBER)?;
        let version = SaveVersion::unmarshal_header(&mut chr)?;
        version.check_loadable()?;
        let ctx = DecodeContext::new(version);
        tag_read(&mut chr, TagId::CharHeader, &mut game, &ctx)?;
        ensure_consumed(&mut chr, TagId::CharHeader)?;
        drop(chr);

        read_member(package, PLAYER_MEMBER, TagId::Player, &mut game, &ctx)?;

        let mut lvl = package.member(LEVEL_MEMBER)?;
        tag_read(&mut lvl, TagId::Level, &mut game, &ctx)?;
        let mut last = TagId::Level;
        if !lvl.is_exhausted()? {
            tag_read(&mut lvl, TagId::Ghost, &mut game, &ctx)?;
            last = TagId::Ghost;
        }
        ensure_consumed(&mut lvl, last)?;
        drop(lvl);

        log::debug!("{}: loaded version {} save", package.name(), version);
        Ok(game)
    }

    /// Load the save package at the given path
    pub fn load_from_path<P: AsRef<Path>>(path: P, options: &SaveOptions) -> Result<GameState, Error> {
        let mut package = Package::open(path)?.with_safe_read(options.safe_read);
        GameState::read_save(&mut package)
    }
}

/// Read the version and character header of a save
///
/// Only the frozen `chr` member is touched, in safe read mode, so this
/// works for saves this build cannot load. Any bytes the header gained
/// after this build was released are skipped.
pub fn browse<R: Read + Seek>(package: &mut Package<R>) -> Result<SaveSummary, Error> {
    let mut chr = package.member(CHR_MEMBER)?;
    chr.set_safe_read(true);

    let version = SaveVersion::unmarshal_header(&mut chr)?;
    let ctx = DecodeContext::new(version);
    let mut header = CharHeader::default();
    tag_read(&mut chr, TagId::CharHeader, &mut header, &ctx)?;
    Ok(SaveSummary { version, header })
}

/// [browse] the save package at the given path
pub fn browse_path<P: AsRef<Path>>(path: P) -> Result<SaveSummary, Error> {
    let mut package = Package::open(path)?;
    browse(&mut package)
}
