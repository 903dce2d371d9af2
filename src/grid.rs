//! Two dimensional level data and its run length encoding.
//!
//! Cells are stored and serialized row-major: every cell of row 0, then
//! every cell of row 1, and so on.

use crate::{
    ByteSink, ByteSource, Canary, DecodeContext, Error, ErrorKind, Marshal, ReadExt, Unmarshal,
    WriteExt,
};
use std::ops::{Index, IndexMut};

/// Longest run a single run length record can describe
pub const MAX_RUN: u8 = u8::MAX;

const MAX_PREALLOC: usize = 64 * 1024;

/// A position on a grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Coord { x, y }
    }
}

impl Marshal for Coord {
    fn marshal<W: ByteSink + ?Sized>(&self, w: &mut W) {
        w.write_i32(self.x);
        w.write_i32(self.y);
    }
}

impl Unmarshal for Coord {
    fn unmarshal<R: ByteSource + ?Sized>(r: &mut R, _ctx: &DecodeContext) -> Result<Self, Error> {
        let x = r.read_i32()?;
        let y = r.read_i32()?;
        Ok(Coord { x, y })
    }
}

/// A `width × height` rectangle of cells
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T: Clone> Grid<T> {
    /// A grid with every cell set to the given value
    pub fn filled(width: usize, height: usize, value: T) -> Self {
        Grid {
            width,
            height,
            cells: vec![value; width * height],
        }
    }

    /// Set every cell to the given value
    pub fn fill(&mut self, value: T) {
        self.cells.iter_mut().for_each(|x| *x = value.clone());
    }
}

impl<T: Clone + Default> Grid<T> {
    /// A grid of default cells
    pub fn new(width: usize, height: usize) -> Self {
        Grid::filled(width, height, T::default())
    }
}

impl<T> Grid<T> {
    /// Wrap row-major cells
    ///
    /// # Panics
    ///
    /// If the number of cells is not `width * height`
    pub fn from_cells(width: usize, height: usize, cells: Vec<T>) -> Self {
        assert_eq!(
            cells.len(),
            width * height,
            "{}x{} grid needs {} cells",
            width,
            height,
            width * height
        );
        Grid {
            width,
            height,
            cells,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// `(width, height)`
    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Number of cells
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Whether the position lies on the grid
    #[inline]
    pub fn contains(&self, pos: Coord) -> bool {
        self.position(pos).is_some()
    }

    #[inline]
    fn position(&self, pos: Coord) -> Option<usize> {
        let x = usize::try_from(pos.x).ok()?;
        let y = usize::try_from(pos.y).ok()?;
        if x < self.width && y < self.height {
            Some(y * self.width + x)
        } else {
            None
        }
    }

    pub fn get(&self, pos: Coord) -> Option<&T> {
        self.position(pos).map(|i| &self.cells[i])
    }

    pub fn get_mut(&mut self, pos: Coord) -> Option<&mut T> {
        self.position(pos).map(move |i| &mut self.cells[i])
    }

    /// The cells in row-major order
    #[inline]
    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    /// Iterate positions alongside cells in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (Coord, &T)> + '_ {
        let width = self.width.max(1);
        self.cells.iter().enumerate().map(move |(i, cell)| {
            let pos = Coord::new((i % width) as i32, (i / width) as i32);
            (pos, cell)
        })
    }

    /// Apply a function to every cell
    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> Grid<U> {
        Grid {
            width: self.width,
            height: self.height,
            cells: self.cells.iter().map(f).collect(),
        }
    }

    pub fn into_cells(self) -> Vec<T> {
        self.cells
    }
}

impl<T> Index<Coord> for Grid<T> {
    type Output = T;

    fn index(&self, pos: Coord) -> &T {
        match self.position(pos) {
            Some(i) => &self.cells[i],
            None => panic!(
                "({}, {}) is outside of the {}x{} grid",
                pos.x, pos.y, self.width, self.height
            ),
        }
    }
}

impl<T> IndexMut<Coord> for Grid<T> {
    fn index_mut(&mut self, pos: Coord) -> &mut T {
        match self.position(pos) {
            Some(i) => &mut self.cells[i],
            None => panic!(
                "({}, {}) is outside of the {}x{} grid",
                pos.x, pos.y, self.width, self.height
            ),
        }
    }
}

/// A run of identical, consecutive cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run<'a, T> {
    pub len: u8,
    pub value: &'a T,
}

/// Iterator over the runs of a grid. See [rle_runs].
#[derive(Debug)]
pub struct RleRuns<'a, T> {
    cells: &'a [T],
}

impl<'a, T: PartialEq> Iterator for RleRuns<'a, T> {
    type Item = Run<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let (value, rest) = self.cells.split_first()?;
        let len = rest
            .iter()
            .take(usize::from(MAX_RUN) - 1)
            .take_while(|x| *x == value)
            .count()
            + 1;
        self.cells = &self.cells[len..];
        Some(Run {
            len: len as u8,
            value,
        })
    }
}

/// Split a grid into runs of equal cells, row-major, none longer than
/// [MAX_RUN]. An empty grid has no runs.
///
/// ```rust
/// use tagsave::{rle_runs, Grid};
/// let grid = Grid::from_cells(3, 2, vec![1, 1, 1, 1, 2, 2]);
/// let runs: Vec<_> = rle_runs(&grid).map(|r| (r.len, *r.value)).collect();
/// assert_eq!(runs, vec![(4, 1), (2, 2)]);
/// ```
pub fn rle_runs<T: PartialEq>(grid: &Grid<T>) -> RleRuns<'_, T> {
    RleRuns { cells: &grid.cells }
}

/// Write the grid as `(u8 run, value)` records. An empty grid has no
/// records at all.
pub fn marshal_rle<W, T>(w: &mut W, grid: &Grid<T>)
where
    W: ByteSink + ?Sized,
    T: Marshal + PartialEq,
{
    for run in rle_runs(grid) {
        w.write_u8(run.len);
        run.value.marshal(w);
    }
}

/// Fill the grid from `(u8 run, value)` records until every cell is
/// covered
pub fn unmarshal_rle<R, T>(r: &mut R, ctx: &DecodeContext, grid: &mut Grid<T>) -> Result<(), Error>
where
    R: ByteSource + ?Sized,
    T: Unmarshal + Clone,
{
    let end = grid.len();
    let mut filled = 0;
    while filled < end {
        let offset = r.position();
        let run = r.read_u8()?;
        let value = T::unmarshal(r, ctx)?;

        let len = usize::from(run);
        if len == 0 || filled + len > end {
            return Err(Error::new(ErrorKind::InvalidRun { offset, run }));
        }

        grid.cells[filled..filled + len].fill(value);
        filled += len;
    }

    Ok(())
}

fn write_dimension<W: ByteSink + ?Sized>(w: &mut W, value: usize) {
    let value = i16::try_from(value).expect("grid dimension must fit in an i16");
    w.write_i16(value)
}

fn read_dimension<R: ByteSource + ?Sized>(r: &mut R) -> Result<usize, Error> {
    let offset = r.position();
    let value = r.read_i16()?;
    usize::try_from(value).map_err(|_| {
        Error::new(ErrorKind::InvalidLength {
            offset,
            len: i64::from(value),
        })
    })
}

/// Write a level grid section: `i16 width, i16 height, canary`, every cell
/// row-major, the run length encoded colours, and a closing canary.
///
/// # Panics
///
/// If the two grids differ in size or a dimension does not fit in an i16
pub fn marshal_grid_section<W, C, V>(w: &mut W, cells: &Grid<C>, colours: &Grid<V>)
where
    W: ByteSink + ?Sized,
    C: Marshal,
    V: Marshal + PartialEq,
{
    assert_eq!(
        cells.dimensions(),
        colours.dimensions(),
        "cell and colour grids must have the same dimensions"
    );

    write_dimension(w, cells.width());
    write_dimension(w, cells.height());
    Canary::mark(w);
    for cell in cells.cells() {
        cell.marshal(w);
    }
    marshal_rle(w, colours);
    Canary::mark(w);
}

/// Read a section written by [marshal_grid_section]. When dimensions are
/// expected, any other size is rejected before cells are decoded.
pub fn unmarshal_grid_section<R, C, V>(
    r: &mut R,
    ctx: &DecodeContext,
    expected: Option<(usize, usize)>,
) -> Result<(Grid<C>, Grid<V>), Error>
where
    R: ByteSource + ?Sized,
    C: Unmarshal,
    V: Unmarshal + Clone + Default,
{
    let width = read_dimension(r)?;
    let height = read_dimension(r)?;
    if let Some(expected) = expected {
        if expected != (width, height) {
            return Err(Error::new(ErrorKind::GridDimensions {
                expected,
                found: (width, height),
            }));
        }
    }

    Canary::expect(r)?;

    let count = width * height;
    let mut cells = Vec::with_capacity(count.min(MAX_PREALLOC));
    for _ in 0..count {
        cells.push(C::unmarshal(r, ctx)?);
    }
    let cells = Grid::from_cells(width, height, cells);

    let mut colours = Grid::new(width, height);
    unmarshal_rle(r, ctx, &mut colours)?;
    Canary::expect(r)?;
    Ok((cells, colours))
}
