use crate::{
    ByteSink, ByteSource, DecodeContext, Error, ErrorKind, Marshal, MemorySink, ReadExt,
    SliceSource, TagHandler, TagId, TagMinor, Unmarshal, WriteExt, TAG_CHR_FORMAT,
};

/// Species names for saves that predate 32.27, indexed by species id
const LEGACY_SPECIES: &[&str] = &[
    "Human",
    "High Elf",
    "Deep Elf",
    "Sludge Elf",
    "Mountain Dwarf",
    "Halfling",
    "Hill Orc",
    "Kobold",
    "Mummy",
    "Naga",
    "Ogre",
    "Troll",
    "Red Draconian",
    "White Draconian",
    "Green Draconian",
    "Yellow Draconian",
    "Grey Draconian",
    "Black Draconian",
    "Purple Draconian",
    "Mottled Draconian",
    "Pale Draconian",
    "Draconian",
    "Centaur",
    "Demigod",
    "Spriggan",
    "Minotaur",
    "Demonspawn",
    "Ghoul",
    "Tengu",
    "Merfolk",
    "Vampire",
    "Deep Dwarf",
    "Felid",
    "Octopode",
];

/// God names for saves that predate 32.27, indexed by religion id
const LEGACY_GODS: &[&str] = &[
    "",
    "Zin",
    "The Shining One",
    "Kikubaaqudgha",
    "Yredelemnul",
    "Xom",
    "Vehumet",
    "Okawaru",
    "Makhleb",
    "Sif Muna",
    "Trog",
    "Nemelex Xobeh",
    "Elyvilon",
    "Lugonu",
    "Beogh",
    "Jiyva",
    "Fedhas",
    "Cheibriados",
    "Ashenzari",
];

const UNKNOWN_SPECIES: &str = "Yak";
const UNKNOWN_GOD: &str = "Marduk";

/// How the game was started. Unrecognized values are kept as is so a
/// browser can list saves from newer builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GameType {
    Unspecified,
    #[default]
    Normal,
    Tutorial,
    Arena,
    Sprint,
    Hints,
    Other(u8),
}

impl From<u8> for GameType {
    fn from(value: u8) -> Self {
        match value {
            0 => GameType::Unspecified,
            1 => GameType::Normal,
            2 => GameType::Tutorial,
            3 => GameType::Arena,
            4 => GameType::Sprint,
            5 => GameType::Hints,
            x => GameType::Other(x),
        }
    }
}

impl From<GameType> for u8 {
    fn from(value: GameType) -> Self {
        match value {
            GameType::Unspecified => 0,
            GameType::Normal => 1,
            GameType::Tutorial => 2,
            GameType::Arena => 3,
            GameType::Sprint => 4,
            GameType::Hints => 5,
            GameType::Other(x) => x,
        }
    }
}

/// What a save browser shows about a character
///
/// The layout is frozen: it must stay readable by every build, across
/// major versions, so fields are only ever appended. Ids are not validated
/// here since the save may come from a build with more species or gods.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CharHeader {
    pub name: String,
    pub build_version: String,
    pub species: u8,
    pub job: u8,
    pub experience_level: i8,
    pub job_name: String,
    pub religion: u8,
    pub second_god_name: String,
    pub wizard: bool,
    pub game_type: GameType,
    pub species_name: String,
    pub god_name: String,
    pub map: String,
    pub explore: bool,
    pub depth: u8,
}

impl CharHeader {
    /// Display name of a species id for saves that did not record one
    pub fn legacy_species_name(species: u8) -> &'static str {
        LEGACY_SPECIES
            .get(usize::from(species))
            .copied()
            .unwrap_or(UNKNOWN_SPECIES)
    }

    /// Display name of a religion id for saves that did not record one
    pub fn legacy_god_name(religion: u8) -> &'static str {
        LEGACY_GODS
            .get(usize::from(religion))
            .copied()
            .unwrap_or(UNKNOWN_GOD)
    }
}

impl Marshal for CharHeader {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        w.write_u8(TAG_CHR_FORMAT);
        w.write_string(&self.name);
        w.write_string(&self.build_version);
        w.write_u8(self.species);
        w.write_u8(self.job);
        w.write_i8(self.experience_level);
        w.write_string(&self.job_name);
        w.write_u8(self.religion);
        w.write_string(&self.second_god_name);
        w.write_bool(self.wizard);
        w.write_u8(self.game_type.into());
        if self.game_type == GameType::Tutorial {
            w.write_string(&self.map);
        }
        w.write_string(&self.species_name);
        w.write_string(&self.god_name);

        // written again outside the tutorial branch so every game type
        // carries its map
        w.write_string(&self.map);
        w.write_bool(self.explore);
        w.write_u8(self.depth);
    }
}

impl Unmarshal for CharHeader {
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, ctx: &DecodeContext) -> Result<Self, Error> {
        let format = r.read_u8()?;
        if format > TAG_CHR_FORMAT {
            return Err(Error::new(ErrorKind::UnsupportedFormat { format }));
        }

        let version = ctx.version();
        let mut header = CharHeader {
            name: r.read_string()?,
            build_version: r.read_string()?,
            species: r.read_u8()?,
            job: r.read_u8()?,
            experience_level: r.read_i8()?,
            job_name: r.read_string()?,
            religion: r.read_u8()?,
            second_god_name: r.read_string()?,
            wizard: r.read_bool()?,
            ..CharHeader::default()
        };

        // a handful of 34 minors stored the explore flag mid record
        if version.major() == 34 && (121..130).contains(&version.minor()) {
            header.explore = r.read_bool()?;
        }

        header.game_type = GameType::from(r.read_u8()?);
        if header.game_type == GameType::Tutorial {
            header.map = r.read_string()?;
        }

        if ctx.at_least(32, 27) {
            header.species_name = r.read_string()?;
            header.god_name = r.read_string()?;
        } else {
            header.species_name = CharHeader::legacy_species_name(header.species).to_string();
            header.god_name = CharHeader::legacy_god_name(header.religion).to_string();
        }

        if ctx.at_least(34, 29) {
            header.map = r.read_string()?;
        }

        if ctx.at_least(34, 130) {
            header.explore = r.read_bool()?;
        }

        if ctx.has_minor(TagMinor::CharDepth) {
            header.depth = r.read_u8()?;
        }

        Ok(header)
    }
}

/// Lets a save browser decode the header tag without any game state
impl TagHandler for CharHeader {
    fn construct(&self, tag: TagId, w: &mut MemorySink) {
        if tag == TagId::CharHeader {
            self.marshal(w);
        }
    }

    fn read(
        &mut self,
        tag: TagId,
        r: &mut SliceSource<'_>,
        ctx: &DecodeContext,
    ) -> Result<(), Error> {
        if tag == TagId::CharHeader {
            *self = CharHeader::unmarshal(r, ctx)?;
        }
        Ok(())
    }
}
