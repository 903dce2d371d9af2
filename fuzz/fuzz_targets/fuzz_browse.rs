#![no_main]
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use tagsave::{read_bones, save::browse, GameState, Package, SliceSource};

fuzz_target!(|data: &[u8]| {
    let _ = read_bones(&mut SliceSource::new(data));

    let mut package = match Package::new(Cursor::new(data), "fuzz") {
        Ok(x) => x,
        Err(_) => return,
    };

    let _ = browse(&mut package);
    let _ = GameState::read_save(&mut package);
});
