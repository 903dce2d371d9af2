//! The game records a save is made of and how they map onto tags.

mod char_header;
mod ghost;
mod level;
mod player;

pub use self::char_header::{CharHeader, GameType};
pub use self::ghost::{
    marshal_ghosts, read_bones, unmarshal_ghosts, write_bones, Bones, GhostRecord, GhostSpell,
    MAX_GHOSTS,
};
pub use self::level::{Cell, Cloud, LevelState, GXM, GYM};
pub use self::player::{Companion, PlayerState, SkillState, NUM_RUNES, NUM_SPELLS};

use crate::{
    Canary, DecodeContext, Error, Marshal, MemorySink, SliceSource, TagHandler, TagId, Unmarshal,
};

/// Complete state of a game in progress
///
/// ```rust
/// use tagsave::{tag_read, tag_write, DecodeContext, GameState, SliceSource, MemorySink, TagId};
///
/// let mut game = GameState::default();
/// game.player.gold = 42;
///
/// let mut sink = MemorySink::new();
/// tag_write(TagId::Player, &game, &mut sink);
///
/// let mut loaded = GameState::default();
/// let ctx = DecodeContext::current();
/// tag_read(&mut SliceSource::new(sink.as_slice()), TagId::Player, &mut loaded, &ctx)?;
/// assert_eq!(loaded.player.gold, 42);
/// # Ok::<(), tagsave::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameState {
    pub header: CharHeader,
    pub player: PlayerState,
    pub level: LevelState,
    pub ghosts: Vec<GhostRecord>,
}

impl TagHandler for GameState {
    fn construct(&self, tag: TagId, w: &mut MemorySink) {
        match tag {
            TagId::CharHeader => self.header.marshal(w),
            TagId::Player => {
                self.player.write_core(w);
                Canary::mark(w);
                self.player.write_progress(w);
                Canary::mark(w);
                self.player.write_skills(w);
                Canary::mark(w);
                self.player.write_durations(w);
                Canary::mark(w);
                self.player.write_companions(w);
            }
            TagId::Level => {
                self.level.write_map(w);
                Canary::mark(w);
                self.level.write_clouds(w);
                Canary::mark(w);
                self.level.write_extras(w);
            }
            TagId::Ghost => {
                if !self.ghosts.is_empty() {
                    marshal_ghosts(w, &self.ghosts);
                }
            }
        }
    }

    fn read(
        &mut self,
        tag: TagId,
        r: &mut SliceSource<'_>,
        ctx: &DecodeContext,
    ) -> Result<(), Error> {
        match tag {
            TagId::CharHeader => self.header = CharHeader::unmarshal(r, ctx)?,
            TagId::Player => {
                self.player.read_core(r, ctx)?;
                Canary::expect(r)?;
                self.player.read_progress(r, ctx)?;
                Canary::expect(r)?;
                self.player.read_skills(r, ctx)?;
                Canary::expect(r)?;
                self.player.read_durations(r, ctx)?;
                Canary::expect(r)?;
                self.player.read_companions(r, ctx)?;
            }
            TagId::Level => {
                self.level.read_map(r, ctx)?;
                Canary::expect(r)?;
                self.level.read_clouds(r, ctx)?;
                Canary::expect(r)?;
                self.level.read_extras(r, ctx)?;
            }
            TagId::Ghost => self.ghosts = unmarshal_ghosts(r, ctx)?,
        }
        Ok(())
    }
}
