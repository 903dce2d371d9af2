#![no_main]
use libfuzzer_sys::fuzz_target;
use tagsave::{tag_read_raw, DecodeContext, GameState, SaveVersion, SliceSource, TAG_MAJOR_VERSION};

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    let version = SaveVersion::new(TAG_MAJOR_VERSION, i32::from(data[0] % 8));
    let ctx = DecodeContext::new(version);
    let mut source = SliceSource::new(&data[2..]);
    let mut game = GameState::default();
    let _ = tag_read_raw(&mut source, data[1] % 5, &mut game, &ctx);
});
