use crate::container::{marshal_seq, unmarshal_vec};
use crate::grid::{marshal_grid_section, unmarshal_grid_section};
use crate::{
    ByteSink, ByteSource, Coord, DecodeContext, Error, ErrorKind, Grid, Marshal, ReadExt, TagMinor,
    Unmarshal, WriteExt,
};

/// Width of a level
pub const GXM: usize = 80;

/// Height of a level
pub const GYM: usize = 70;

/// One square of terrain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    pub feature: u8,
    pub flags: u32,
}

impl Marshal for Cell {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        w.write_u8(self.feature);
        w.write_u32(self.flags);
    }
}

impl Unmarshal for Cell {
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, _ctx: &DecodeContext) -> Result<Self, Error> {
        Ok(Cell {
            feature: r.read_u8()?,
            flags: r.read_u32()?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cloud {
    pub kind: u8,
    pub pos: Coord,
    pub decay: i16,
    pub spread_rate: u8,
    pub whose: u8,
    pub killer: u8,
    pub source: i32,
    pub excl_rad: i32,
}

impl Marshal for Cloud {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        w.write_u8(self.kind);
        self.pos.marshal(w);
        w.write_i16(self.decay);
        w.write_u8(self.spread_rate);
        w.write_u8(self.whose);
        w.write_u8(self.killer);
        w.write_i32(self.source);
        w.write_i32(self.excl_rad);
    }
}

impl Unmarshal for Cloud {
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, ctx: &DecodeContext) -> Result<Self, Error> {
        Ok(Cloud {
            kind: r.read_u8()?,
            pos: Coord::unmarshal(r, ctx)?,
            decay: r.read_i16()?,
            spread_rate: r.read_u8()?,
            whose: r.read_u8()?,
            killer: r.read_u8()?,
            source: r.read_i32()?,
            excl_rad: r.read_i32()?,
        })
    }
}

/// The level the player is standing on
///
/// The level tag has three sections with a canary between each: the map
/// (colours, clocks, and the terrain grid), the clouds, and the extras
/// (spawn rate, heightmap, and density).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelState {
    pub floor_colour: u8,
    pub rock_colour: u8,
    pub elapsed_time: i32,
    pub player_pos: Coord,
    pub turns_on_level: i32,
    pub cells: Grid<Cell>,
    pub colours: Grid<u8>,

    pub clouds: Vec<Cloud>,

    pub spawn_rate: i32,
    pub heightmap: Option<Grid<i16>>,
    pub density: i32,
}

impl Default for LevelState {
    fn default() -> Self {
        LevelState {
            floor_colour: 0,
            rock_colour: 0,
            elapsed_time: 0,
            player_pos: Coord::default(),
            turns_on_level: 0,
            cells: Grid::new(GXM, GYM),
            colours: Grid::new(GXM, GYM),
            clouds: Vec::new(),
            spawn_rate: 0,
            heightmap: None,
            density: 0,
        }
    }
}

impl LevelState {
    pub(crate) fn write_map<W: ByteSink + ?Sized>(&self, w: &mut W) {
        w.write_u8(self.floor_colour);
        w.write_u8(self.rock_colour);
        w.write_i32(self.elapsed_time);
        self.player_pos.marshal(w);
        w.write_i32(self.turns_on_level);
        marshal_grid_section(w, &self.cells, &self.colours);
    }

    pub(crate) fn read_map<R: ByteSource + ?Sized>(
        &mut self,
        r: &mut R,
        ctx: &DecodeContext,
    ) -> Result<(), Error> {
        self.floor_colour = r.read_u8()?;
        self.rock_colour = r.read_u8()?;
        self.elapsed_time = r.read_i32()?;
        self.player_pos = Coord::unmarshal(r, ctx)?;
        self.turns_on_level = r.read_i32()?;
        let (cells, colours) = unmarshal_grid_section(r, ctx, Some((GXM, GYM)))?;
        self.cells = cells;
        self.colours = colours;
        Ok(())
    }

    pub(crate) fn write_clouds<W: ByteSink + ?Sized>(&self, w: &mut W) {
        marshal_seq(w, &self.clouds);
    }

    /// Clouds are keyed by position, so one off the level means the data
    /// is garbage
    pub(crate) fn read_clouds<R: ByteSource + ?Sized>(
        &mut self,
        r: &mut R,
        ctx: &DecodeContext,
    ) -> Result<(), Error> {
        let clouds: Vec<Cloud> = unmarshal_vec(r, ctx)?;
        if let Some(cloud) = clouds.iter().find(|x| !self.cells.contains(x.pos)) {
            return Err(Error::new(ErrorKind::InvalidRecord(format!(
                "cloud at ({}, {}) is off the level",
                cloud.pos.x, cloud.pos.y
            ))));
        }

        self.clouds = clouds;
        Ok(())
    }

    /// # Panics
    ///
    /// If the heightmap and the level differ in size
    pub(crate) fn write_extras<W: ByteSink + ?Sized>(&self, w: &mut W) {
        w.write_i32(self.spawn_rate);
        match &self.heightmap {
            Some(heightmap) => {
                assert_eq!(
                    heightmap.dimensions(),
                    self.cells.dimensions(),
                    "heightmap must cover the level"
                );
                w.write_bool(true);
                for height in heightmap.cells() {
                    w.write_i16(*height);
                }
            }
            None => w.write_bool(false),
        }
        w.write_i32(self.density);
    }

    pub(crate) fn read_extras<R: ByteSource + ?Sized>(
        &mut self,
        r: &mut R,
        ctx: &DecodeContext,
    ) -> Result<(), Error> {
        self.spawn_rate = r.read_i32()?;
        self.heightmap = if r.read_bool()? {
            let (width, height) = self.cells.dimensions();
            let mut heights = Vec::with_capacity(width * height);
            for _ in 0..width * height {
                heights.push(r.read_i16()?);
            }
            Some(Grid::from_cells(width, height, heights))
        } else {
            None
        };

        self.density = if ctx.has_minor(TagMinor::LevelDensity) {
            r.read_i32()?
        } else {
            0
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemorySink, SaveVersion, SliceSource, TAG_MAJOR_VERSION};

    #[test]
    fn test_map_section_roundtrip() {
        let mut level = LevelState::default();
        level.cells[Coord::new(10, 5)] = Cell {
            feature: 3,
            flags: 0x8000_0001,
        };
        level.colours[Coord::new(79, 69)] = 4;
        level.turns_on_level = 99;

        let mut sink = MemorySink::new();
        level.write_map(&mut sink);

        let ctx = DecodeContext::current();
        let mut source = SliceSource::new(sink.as_slice());
        let mut out = LevelState {
            cells: Grid::new(1, 1),
            ..LevelState::default()
        };
        out.read_map(&mut source, &ctx).unwrap();
        assert_eq!(out, level);
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn test_cloud_off_level() {
        let level = LevelState {
            clouds: vec![Cloud {
                pos: Coord::new(GXM as i32, 0),
                ..Cloud::default()
            }],
            ..LevelState::default()
        };

        let mut sink = MemorySink::new();
        level.write_clouds(&mut sink);
        let ctx = DecodeContext::current();
        let mut out = LevelState::default();
        let err = out
            .read_clouds(&mut SliceSource::new(sink.as_slice()), &ctx)
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidRecord(_)));
    }

    #[test]
    fn test_density_gated() {
        let level = LevelState {
            spawn_rate: 5,
            heightmap: Some(Grid::filled(GXM, GYM, -3)),
            density: 17,
            ..LevelState::default()
        };

        let mut sink = MemorySink::new();
        level.write_extras(&mut sink);
        let data = &sink.as_slice()[..sink.len() - 4];

        let version = SaveVersion::new(TAG_MAJOR_VERSION, TagMinor::SpellLibrary.value());
        let ctx = DecodeContext::new(version);
        let mut source = SliceSource::new(data);
        let mut out = LevelState::default();
        out.read_extras(&mut source, &ctx).unwrap();
        assert_eq!(out.density, 0);
        assert_eq!(out.heightmap, level.heightmap);
        assert_eq!(source.remaining(), 0);
    }
}
