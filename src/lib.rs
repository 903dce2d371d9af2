/*!

Versioned binary marshalling for game save files that have to stay loadable
across years of releases.

Every value is written through a [ByteSink] and read back through a
[ByteSource], in big endian with no padding. Records are grouped into tags
(`[i32 length][payload]`) so a reader always knows where one ends, and
canary bytes between sections turn silent drift into an error at the exact
offset where the reader and writer disagree.

## Features

- ✔ Versioned: each save carries a `(major, minor)` version and decoders gate
  fields on the minor revision that introduced them
- ✔ Defensive: canaries, length checks, and bounded allocation for untrusted data
- ✔ Compact: LEB128 varints, zig-zag signed varints, packed bit vectors, and
  run length encoded grids
- ✔ Portable: memory, file, and zip archive member backends behind one trait
- ✔ Ergonomic: derive macros generate the codecs for plain records

## Quick Start

```rust
# #[cfg(feature = "derive")] {
use tagsave::{DecodeContext, Marshal, MemorySink, SliceSource, Unmarshal};

#[derive(Marshal, Unmarshal, PartialEq, Debug)]
struct Monster {
    name: String,
    hp: i16,
    #[tagsave(with = "tagsave::varint")]
    experience: u64,
    #[tagsave(canary)]
    spells: Vec<i16>,
}

let monster = Monster {
    name: String::from("orc"),
    hp: 12,
    experience: 300,
    spells: vec![4, 10],
};

let mut sink = MemorySink::new();
monster.marshal(&mut sink);

let ctx = DecodeContext::current();
let actual = Monster::unmarshal(&mut SliceSource::new(sink.as_slice()), &ctx).unwrap();
assert_eq!(actual, monster);
# }
```

## Versioning

A field added in a later minor revision is only read when the save is at
least that new, and takes its default otherwise:

```rust
# #[cfg(feature = "derive")] {
use tagsave::{DecodeContext, SaveVersion, SliceSource, TagMinor, Unmarshal, TAG_MAJOR_VERSION};

#[derive(tagsave::Unmarshal, Debug)]
struct Level {
    turns: i32,
    #[tagsave(since = "TagMinor::LevelDensity")]
    density: i32,
}

let old = DecodeContext::new(SaveVersion::new(TAG_MAJOR_VERSION, TagMinor::Reset.value()));
let level = Level::unmarshal(&mut SliceSource::new(&[0, 0, 0, 9]), &old).unwrap();
assert_eq!(level.turns, 9);
assert_eq!(level.density, 0);
# }
```

## Save Files

With the `package` feature (on by default) a [GameState] is written to a zip
archive whose `chr` member holds the version and character header. That
member is frozen so [browse](save::browse) can list saves from any build,
while [GameState::read_save] refuses ancient and future saves before
decoding anything else.

## Caveats

Sinks do not return errors from individual writes. The first failure is
remembered and reported once the sink is finished, so always call `finish`
on file and archive sinks.
*/
extern crate self as tagsave;

mod bitvec;
mod canary;
pub mod container;
mod errors;
mod grid;
mod options;
mod primitive;
mod records;
#[cfg(feature = "package")]
pub mod save;
mod stream;
mod tag;
mod version;

pub use self::bitvec::FixedBitVector;
pub use self::canary::{Canary, CANARY};
pub use self::errors::{Error, ErrorKind};
pub use self::grid::{
    marshal_grid_section, marshal_rle, rle_runs, unmarshal_grid_section, unmarshal_rle, Coord,
    Grid, RleRuns, Run, MAX_RUN,
};
pub use self::options::{PackageCompression, SaveOptions};
pub use self::primitive::{
    signed_varint, varint, varint_len, zigzag_decode, zigzag_encode, Marshal, ReadExt, Unmarshal,
    WriteExt, MAX_STRING_LEN,
};
pub use self::records::*;
pub use self::stream::{ByteSink, ByteSource, FileSink, FileSource, MemorySink, SliceSource};
#[cfg(feature = "package")]
pub use self::stream::{MemberSink, MemberSource, Package, PackageWriter};
pub use self::tag::{tag_read, tag_read_raw, tag_write, TagHandler, TagId};
pub use self::version::{
    DecodeContext, SaveVersion, TagMinor, BONES_MINOR_TAGS, TAG_CHR_FORMAT, TAG_MAJOR_VERSION,
    TAG_MINOR_VERSION,
};

#[cfg(feature = "derive")]
pub use tagsave_derive::*;
