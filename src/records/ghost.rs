use crate::container::{marshal_seq, unmarshal_vec};
use crate::tag::{tag_read, tag_write, TagHandler, TagId};
use crate::{
    ByteSink, ByteSource, DecodeContext, Error, ErrorKind, Marshal, MemorySink, ReadExt,
    SaveVersion, SliceSource, TagMinor, Unmarshal, WriteExt,
};

/// Most ghosts a level or bones file can hold
pub const MAX_GHOSTS: usize = 10;

/// Slowest and fastest valid ghost movement energy
const MOVE_ENERGY: std::ops::RangeInclusive<i16> = 6..=15;

/// Movement energy given to ghosts recorded with a nonsensical one
const DEFAULT_MOVE_ENERGY: i16 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GhostSpell {
    pub spell: i16,
    pub freq: u8,
    pub flags: u16,
}

impl Marshal for GhostSpell {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        w.write_i16(self.spell);
        w.write_u8(self.freq);
        w.write_u16(self.flags);
    }
}

impl Unmarshal for GhostSpell {
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, _ctx: &DecodeContext) -> Result<Self, Error> {
        Ok(GhostSpell {
            spell: r.read_i16()?,
            freq: r.read_u8()?,
            flags: r.read_u16()?,
        })
    }
}

/// The remains of a dead character, replayed as a monster in other games
///
/// Ghosts travel between games in bones files, so any layout change here
/// must also be listed in the bones minor tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostRecord {
    pub name: String,
    pub species: i16,
    pub job: i16,
    pub religion: u8,
    pub best_skill: i16,
    pub best_skill_level: i16,
    pub xl: i16,
    pub max_hp: i16,
    pub ev: i16,
    pub ac: i16,
    pub damage: i16,
    pub speed: i16,
    pub move_energy: i16,
    pub see_invis: u8,
    pub brand: i16,
    pub att_type: i16,
    pub att_flav: i16,
    pub resists: i32,
    pub colour: u8,
    pub flies: bool,
    pub spells: Vec<GhostSpell>,
}

impl Default for GhostRecord {
    fn default() -> Self {
        GhostRecord {
            name: String::new(),
            species: 0,
            job: 0,
            religion: 0,
            best_skill: 0,
            best_skill_level: 0,
            xl: 1,
            max_hp: 1,
            ev: 0,
            ac: 0,
            damage: 0,
            speed: 10,
            move_energy: DEFAULT_MOVE_ENERGY,
            see_invis: 0,
            brand: 0,
            att_type: 0,
            att_flav: 0,
            resists: 0,
            colour: 0,
            flies: false,
            spells: Vec::new(),
        }
    }
}

impl Marshal for GhostRecord {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        w.write_string(&self.name);
        w.write_i16(self.species);
        w.write_i16(self.job);
        w.write_u8(self.religion);
        w.write_i16(self.best_skill);
        w.write_i16(self.best_skill_level);
        w.write_i16(self.xl);
        w.write_i16(self.max_hp);
        w.write_i16(self.ev);
        w.write_i16(self.ac);
        w.write_i16(self.damage);
        w.write_i16(self.speed);
        w.write_i16(self.move_energy);
        w.write_u8(self.see_invis);
        w.write_i16(self.brand);
        w.write_i16(self.att_type);
        w.write_i16(self.att_flav);
        w.write_i32(self.resists);
        w.write_u8(self.colour);
        w.write_bool(self.flies);
        marshal_seq(w, &self.spells);
    }
}

impl Unmarshal for GhostRecord {
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, ctx: &DecodeContext) -> Result<Self, Error> {
        let mut ghost = GhostRecord {
            name: r.read_string()?,
            species: r.read_i16()?,
            job: r.read_i16()?,
            religion: r.read_u8()?,
            best_skill: r.read_i16()?,
            best_skill_level: r.read_i16()?,
            xl: r.read_i16()?,
            max_hp: r.read_i16()?,
            ev: r.read_i16()?,
            ac: r.read_i16()?,
            damage: r.read_i16()?,
            speed: r.read_i16()?,
            move_energy: r.read_i16()?,
            see_invis: r.read_u8()?,
            brand: r.read_i16()?,
            att_type: r.read_i16()?,
            att_flav: r.read_i16()?,
            resists: r.read_i32()?,
            colour: r.read_u8()?,
            ..GhostRecord::default()
        };

        if ctx.has_minor(TagMinor::GhostFlies) {
            ghost.flies = r.read_bool()?;
        }
        ghost.spells = unmarshal_vec(r, ctx)?;

        if !MOVE_ENERGY.contains(&ghost.move_energy) {
            log::warn!(
                "ghost {} has move energy {}, resetting to {}",
                ghost.name,
                ghost.move_energy,
                DEFAULT_MOVE_ENERGY
            );
            ghost.move_energy = DEFAULT_MOVE_ENERGY;
        }

        Ok(ghost)
    }
}

/// Write a ghost list: an i16 count and the ghosts
///
/// # Panics
///
/// If there are no ghosts or more than [MAX_GHOSTS]
pub fn marshal_ghosts<W: ByteSink + ?Sized>(w: &mut W, ghosts: &[GhostRecord]) {
    assert!(
        (1..=MAX_GHOSTS).contains(&ghosts.len()),
        "ghost lists hold between 1 and {} ghosts, not {}",
        MAX_GHOSTS,
        ghosts.len()
    );
    w.write_i16(ghosts.len() as i16);
    for ghost in ghosts {
        ghost.marshal(w);
    }
}

/// Read a ghost list, rejecting counts outside `1..=MAX_GHOSTS`
pub fn unmarshal_ghosts<R: ByteSource + ?Sized>(
    r: &mut R,
    ctx: &DecodeContext,
) -> Result<Vec<GhostRecord>, Error> {
    let count = r.read_i16()?;
    let count = match usize::try_from(count) {
        Ok(x) if (1..=MAX_GHOSTS).contains(&x) => x,
        _ => {
            return Err(Error::new(ErrorKind::InvalidRecord(format!(
                "bones file has an invalid ghost count ({})",
                count
            ))))
        }
    };

    let mut ghosts = Vec::with_capacity(count);
    for _ in 0..count {
        ghosts.push(GhostRecord::unmarshal(r, ctx)?);
    }
    Ok(ghosts)
}

/// Ghosts stored on their own, to be transplanted into other games
///
/// A bones file is the bones version as two bytes followed by a ghost tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bones {
    pub ghosts: Vec<GhostRecord>,
}

impl TagHandler for Bones {
    fn construct(&self, tag: TagId, w: &mut MemorySink) {
        match tag {
            TagId::Ghost if !self.ghosts.is_empty() => marshal_ghosts(w, &self.ghosts),
            _ => {}
        }
    }

    fn read(
        &mut self,
        tag: TagId,
        r: &mut SliceSource<'_>,
        ctx: &DecodeContext,
    ) -> Result<(), Error> {
        if tag == TagId::Ghost {
            self.ghosts = unmarshal_ghosts(r, ctx)?;
        }
        Ok(())
    }
}

/// Write a bones file
///
/// # Panics
///
/// If there are no ghosts or more than [MAX_GHOSTS]
pub fn write_bones<W: ByteSink + ?Sized>(w: &mut W, ghosts: &[GhostRecord]) {
    let bones = Bones {
        ghosts: ghosts.to_vec(),
    };
    assert!(!bones.ghosts.is_empty(), "bones files hold at least one ghost");
    SaveVersion::current_bones().marshal_header(w);
    tag_write(TagId::Ghost, &bones, w);
}

/// Read a bones file, rejecting versions whose ghosts this build cannot
/// decode
///
/// ```rust
/// use tagsave::{read_bones, write_bones, GhostRecord, MemorySink, SliceSource};
/// let ghost = GhostRecord {
///     name: String::from("Lemuel"),
///     ..GhostRecord::default()
/// };
///
/// let mut sink = MemorySink::new();
/// write_bones(&mut sink, &[ghost.clone()]);
/// let ghosts = read_bones(&mut SliceSource::new(sink.as_slice()))?;
/// assert_eq!(ghosts, vec![ghost]);
/// # Ok::<(), tagsave::Error>(())
/// ```
pub fn read_bones<R: ByteSource + ?Sized>(r: &mut R) -> Result<Vec<GhostRecord>, Error> {
    let version = SaveVersion::unmarshal_header(r)?;
    version.check_bones()?;

    let ctx = DecodeContext::new(version);
    let mut bones = Bones::default();
    tag_read(r, TagId::Ghost, &mut bones, &ctx)?;
    Ok(bones.ghosts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TAG_MAJOR_VERSION;
    use rstest::*;

    fn ghost(name: &str) -> GhostRecord {
        GhostRecord {
            name: name.to_string(),
            xl: 14,
            max_hp: 80,
            flies: true,
            spells: vec![GhostSpell {
                spell: 3,
                freq: 20,
                flags: 1,
            }],
            ..GhostRecord::default()
        }
    }

    fn encode(ghosts: &[GhostRecord]) -> Vec<u8> {
        let mut sink = MemorySink::new();
        marshal_ghosts(&mut sink, ghosts);
        sink.into_inner()
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    #[case(11)]
    fn test_invalid_ghost_count(#[case] count: i16) {
        let mut data = encode(&[ghost("a")]);
        data[..2].copy_from_slice(&count.to_be_bytes());
        let ctx = DecodeContext::current();
        let err = unmarshal_ghosts(&mut SliceSource::new(&data), &ctx).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidRecord(_)));
        assert!(err.is_corruption());
    }

    #[rstest]
    #[case(5, 10)]
    #[case(6, 6)]
    #[case(15, 15)]
    #[case(16, 10)]
    #[case(-4, 10)]
    fn test_move_energy_repaired(#[case] energy: i16, #[case] expected: i16) {
        let mut g = ghost("Slow");
        g.move_energy = energy;
        let data = encode(&[g]);
        let ctx = DecodeContext::current();
        let ghosts = unmarshal_ghosts(&mut SliceSource::new(&data), &ctx).unwrap();
        assert_eq!(ghosts[0].move_energy, expected);
    }

    #[test]
    fn test_flies_gated() {
        let mut sink = MemorySink::new();
        let mut g = ghost("Grounded");
        g.flies = false;
        g.marshal(&mut sink);

        // drop the flies byte, which sits right before the spell count
        let mut data = sink.into_inner();
        let at = data.len() - 4 - 5 - 1;
        data.remove(at);

        let version = SaveVersion::new(TAG_MAJOR_VERSION, TagMinor::LevelDensity.value());
        let ctx = DecodeContext::new(version);
        let mut source = SliceSource::new(&data);
        assert_eq!(GhostRecord::unmarshal(&mut source, &ctx).unwrap(), g);
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn test_bones_roundtrip() {
        let ghosts = vec![ghost("Lemuel"), ghost("Gurgle")];
        let mut sink = MemorySink::new();
        write_bones(&mut sink, &ghosts);
        assert_eq!(&sink.as_slice()[..2], &[TAG_MAJOR_VERSION as u8, 3]);

        let out = read_bones(&mut SliceSource::new(sink.as_slice())).unwrap();
        assert_eq!(out, ghosts);
    }

    #[test]
    fn test_bones_version_rejected() {
        let mut sink = MemorySink::new();
        write_bones(&mut sink, &[ghost("Lemuel")]);
        let mut data = sink.into_inner();
        data[1] = TagMinor::LevelDensity.value() as u8;

        let err = read_bones(&mut SliceSource::new(&data)).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::IncompatibleBones(_)));
        assert!(err.is_version_mismatch());
    }
}
