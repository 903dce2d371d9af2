#![cfg(feature = "derive")]

use rstest::*;
use tagsave::{
    DecodeContext, ErrorKind, Marshal, MemorySink, SaveVersion, SliceSource, TagMinor, Unmarshal,
    TAG_MAJOR_VERSION,
};

#[derive(Marshal, Unmarshal, Debug, Clone, PartialEq)]
struct Ghost {
    name: String,
    #[tagsave(with = "tagsave::varint")]
    experience: u64,
    #[tagsave(since = "TagMinor::GhostFlies")]
    flies: bool,
    #[tagsave(since = 4, default = "default_speed", canary)]
    speed: i16,
    #[tagsave(with = "tagsave::signed_varint")]
    luck: i32,
}

fn default_speed() -> i16 {
    10
}

fn ghost() -> Ghost {
    Ghost {
        name: String::from("Blork"),
        experience: 1_000_000,
        flies: true,
        speed: 12,
        luck: -2,
    }
}

fn ctx(minor: i32) -> DecodeContext {
    DecodeContext::new(SaveVersion::new(TAG_MAJOR_VERSION, minor))
}

/// Encode the ghost the way a build at the given minor would have
fn encode_at(minor: i32) -> Vec<u8> {
    let ghost = ghost();
    let mut sink = MemorySink::new();
    ghost.name.marshal(&mut sink);
    tagsave::varint::marshal(&ghost.experience, &mut sink);
    if minor >= TagMinor::GhostFlies.value() {
        ghost.flies.marshal(&mut sink);
    }
    if minor >= 4 {
        tagsave::Canary::mark(&mut sink);
        ghost.speed.marshal(&mut sink);
    }
    tagsave::signed_varint::marshal(&ghost.luck, &mut sink);
    sink.into_inner()
}

#[rstest]
#[case(0, false, 10)]
#[case(2, false, 10)]
#[case(3, true, 10)]
#[case(4, true, 12)]
#[case(5, true, 12)]
fn test_fields_gated_on_minor(#[case] minor: i32, #[case] flies: bool, #[case] speed: i16) {
    let data = encode_at(minor);
    let mut source = SliceSource::new(&data);
    let actual = Ghost::unmarshal(&mut source, &ctx(minor)).unwrap();
    assert_eq!(
        actual,
        Ghost {
            flies,
            speed,
            ..ghost()
        }
    );
    assert_eq!(source.remaining(), 0);
}

#[test]
fn test_writer_uses_newest_layout() {
    let mut sink = MemorySink::new();
    ghost().marshal(&mut sink);
    assert_eq!(sink.as_slice(), encode_at(TagMinor::CharDepth.value()).as_slice());
}

#[test]
fn test_varint_fields_are_compact() {
    let mut sink = MemorySink::new();
    ghost().marshal(&mut sink);

    // string, 3 byte varint, bool, canary, i16, 1 byte zig-zag
    assert_eq!(sink.len(), (2 + 5) + 3 + 1 + 1 + 2 + 1);
    assert_eq!(*sink.as_slice().last().unwrap(), 3);
}

#[test]
fn test_varint_field_overflow() {
    let mut sink = MemorySink::new();
    Wide { value: u64::MAX }.marshal(&mut sink);

    let err = Narrow::unmarshal(&mut SliceSource::new(sink.as_slice()), &ctx(0)).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::VarintOverflow { offset: 0 }));
}

#[derive(Marshal)]
struct Wide {
    #[tagsave(with = "tagsave::varint")]
    value: u64,
}

#[derive(Unmarshal, Debug)]
struct Narrow {
    #[tagsave(with = "tagsave::varint")]
    #[allow(dead_code)]
    value: u16,
}

#[derive(Marshal, Unmarshal, Debug, PartialEq)]
struct Pair<T> {
    left: T,
    right: T,
}

#[test]
fn test_generic_record() {
    let pair = Pair {
        left: String::from("D:1"),
        right: String::from("Lair:2"),
    };

    let mut sink = MemorySink::new();
    pair.marshal(&mut sink);
    let actual: Pair<String> = Pair::unmarshal(&mut SliceSource::new(sink.as_slice()), &ctx(0)).unwrap();
    assert_eq!(actual, pair);
}
