use crate::container::{marshal_map, marshal_seq, unmarshal_vec};
use crate::{
    ByteSink, ByteSource, Coord, DecodeContext, Error, FixedBitVector, Marshal, ReadExt, TagMinor,
    Unmarshal, WriteExt,
};
use std::collections::BTreeMap;

/// Number of rune types tracked by the player
pub const NUM_RUNES: usize = 20;

/// Number of spells a spell library can hold
pub const NUM_SPELLS: usize = 300;

/// Training state of one skill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SkillState {
    pub level: u8,
    pub points: u32,
    pub training: u8,
}

impl Marshal for SkillState {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        w.write_u8(self.level);
        w.write_u32(self.points);
        w.write_u8(self.training);
    }
}

impl Unmarshal for SkillState {
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, _ctx: &DecodeContext) -> Result<Self, Error> {
        Ok(SkillState {
            level: r.read_u8()?,
            points: r.read_u32()?,
            training: r.read_u8()?,
        })
    }
}

/// A follower left behind on another level
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Companion {
    pub name: String,
    pub level: String,
    pub timestamp: i32,
}

impl Marshal for Companion {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        w.write_string(&self.name);
        w.write_string(&self.level);
        w.write_i32(self.timestamp);
    }
}

impl Unmarshal for Companion {
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, _ctx: &DecodeContext) -> Result<Self, Error> {
        Ok(Companion {
            name: r.read_string()?,
            level: r.read_string()?,
            timestamp: r.read_i32()?,
        })
    }
}

/// Everything about the player character that is not part of a level
///
/// The player tag is split in sections (core, progress, skills, durations,
/// companions) which are written in that order with a canary between each.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerState {
    pub last_mid: i32,
    pub piety: u8,
    pub max_level: i8,
    pub branch: u8,
    pub depth: i8,
    pub position: Coord,
    pub hp: i16,
    pub hp_max: i16,
    pub mp: i16,
    pub mp_max: i16,
    pub stats: [i8; 3],
    pub gold: i32,
    pub energy_rate: f32,

    pub experience: u64,
    pub turns: u64,
    pub runes: FixedBitVector<NUM_RUNES>,
    pub spell_library: FixedBitVector<NUM_SPELLS>,
    pub spells: Vec<i16>,

    pub skills: Vec<SkillState>,

    pub durations: BTreeMap<u16, i32>,

    pub companions: BTreeMap<i32, Companion>,
}

impl PlayerState {
    pub(crate) fn write_core<W: ByteSink + ?Sized>(&self, w: &mut W) {
        w.write_i32(self.last_mid);
        w.write_u8(self.piety);
        w.write_i8(self.max_level);
        w.write_u8(self.branch);
        w.write_i8(self.depth);
        self.position.marshal(w);
        w.write_i16(self.hp);
        w.write_i16(self.hp_max);
        w.write_i16(self.mp);
        w.write_i16(self.mp_max);
        for stat in self.stats {
            w.write_i8(stat);
        }
        w.write_i32(self.gold);
        w.write_f32(self.energy_rate);
    }

    pub(crate) fn read_core<R: ByteSource + ?Sized>(
        &mut self,
        r: &mut R,
        ctx: &DecodeContext,
    ) -> Result<(), Error> {
        self.last_mid = r.read_i32()?;
        self.piety = r.read_u8()?;
        self.max_level = r.read_i8()?;
        self.branch = r.read_u8()?;
        self.depth = r.read_i8()?;
        self.position = Coord::unmarshal(r, ctx)?;
        self.hp = r.read_i16()?;
        self.hp_max = r.read_i16()?;
        self.mp = r.read_i16()?;
        self.mp_max = r.read_i16()?;
        for stat in self.stats.iter_mut() {
            *stat = r.read_i8()?;
        }
        self.gold = r.read_i32()?;
        self.energy_rate = r.read_f32()?;
        Ok(())
    }

    pub(crate) fn write_progress<W: ByteSink + ?Sized>(&self, w: &mut W) {
        w.write_unsigned(self.experience);
        w.write_unsigned(self.turns);
        self.runes.marshal(w);
        self.spell_library.marshal(w);
        marshal_seq(w, &self.spells);
    }

    pub(crate) fn read_progress<R: ByteSource + ?Sized>(
        &mut self,
        r: &mut R,
        ctx: &DecodeContext,
    ) -> Result<(), Error> {
        self.experience = r.read_unsigned()?;
        self.turns = r.read_unsigned()?;
        self.runes = FixedBitVector::unmarshal(r, ctx)?;
        self.spell_library = if ctx.has_minor(TagMinor::SpellLibrary) {
            FixedBitVector::unmarshal(r, ctx)?
        } else {
            FixedBitVector::new()
        };
        self.spells = unmarshal_vec(r, ctx)?;
        Ok(())
    }

    pub(crate) fn write_skills<W: ByteSink + ?Sized>(&self, w: &mut W) {
        marshal_seq(w, &self.skills);
    }

    pub(crate) fn read_skills<R: ByteSource + ?Sized>(
        &mut self,
        r: &mut R,
        ctx: &DecodeContext,
    ) -> Result<(), Error> {
        self.skills = unmarshal_vec(r, ctx)?;
        Ok(())
    }

    pub(crate) fn write_durations<W: ByteSink + ?Sized>(&self, w: &mut W) {
        marshal_map(w, &self.durations);
    }

    pub(crate) fn read_durations<R: ByteSource + ?Sized>(
        &mut self,
        r: &mut R,
        ctx: &DecodeContext,
    ) -> Result<(), Error> {
        self.durations = BTreeMap::unmarshal(r, ctx)?;
        Ok(())
    }

    pub(crate) fn write_companions<W: ByteSink + ?Sized>(&self, w: &mut W) {
        marshal_map(w, &self.companions);
    }

    pub(crate) fn read_companions<R: ByteSource + ?Sized>(
        &mut self,
        r: &mut R,
        ctx: &DecodeContext,
    ) -> Result<(), Error> {
        self.companions = BTreeMap::unmarshal(r, ctx)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySink, SaveVersion, SliceSource, TAG_MAJOR_VERSION};

    fn player() -> PlayerState {
        PlayerState {
            experience: 1_000_000,
            turns: 52_000,
            runes: [3, 7].into_iter().collect(),
            spell_library: [0, 150, 299].into_iter().collect(),
            spells: vec![12, 40],
            ..PlayerState::default()
        }
    }

    #[test]
    fn test_spell_library_gated() {
        let mut sink = MemorySink::new();
        let mut old = player();
        old.spell_library = FixedBitVector::new();

        // a build predating the library never wrote it
        sink.write_unsigned(old.experience);
        sink.write_unsigned(old.turns);
        old.runes.marshal(&mut sink);
        marshal_seq(&mut sink, &old.spells);

        let ctx = DecodeContext::new(SaveVersion::new(TAG_MAJOR_VERSION, TagMinor::Reset.value()));
        let mut source = SliceSource::new(sink.as_slice());
        let mut out = PlayerState::default();
        out.read_progress(&mut source, &ctx).unwrap();
        assert_eq!(out, old);
        assert_eq!(source.remaining(), 0);

        let mut sink = MemorySink::new();
        player().write_progress(&mut sink);
        let ctx = DecodeContext::new(SaveVersion::new(
            TAG_MAJOR_VERSION,
            TagMinor::SpellLibrary.value(),
        ));
        let mut source = SliceSource::new(sink.as_slice());
        let mut out = PlayerState::default();
        out.read_progress(&mut source, &ctx).unwrap();
        assert_eq!(out, player());
        assert_eq!(source.remaining(), 0);
    }
}
