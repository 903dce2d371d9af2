#![no_main]
use libfuzzer_sys::fuzz_target;
use tagsave::{
    unmarshal_grid_section, DecodeContext, FixedBitVector, Grid, MemorySink, ReadExt, SliceSource,
    Unmarshal, WriteExt,
};

fuzz_target!(|data: &[u8]| {
    let ctx = DecodeContext::current();

    let mut source = SliceSource::new(data);
    if let Ok(x) = source.read_unsigned() {
        let mut sink = MemorySink::new();
        sink.write_unsigned(x);
        let mut again = SliceSource::new(sink.as_slice());
        assert_eq!(again.read_unsigned().unwrap(), x);
    }

    let mut source = SliceSource::new(data);
    if let Ok(x) = source.read_signed() {
        let mut sink = MemorySink::new();
        sink.write_signed(x);
        let mut again = SliceSource::new(sink.as_slice());
        assert_eq!(again.read_signed().unwrap(), x);
    }

    let _ = SliceSource::new(data).read_string();
    let _ = FixedBitVector::<300>::unmarshal(&mut SliceSource::new(data), &ctx);
    let _ = Vec::<String>::unmarshal(&mut SliceSource::new(data), &ctx);
    let _: Result<(Grid<u8>, Grid<u16>), _> =
        unmarshal_grid_section(&mut SliceSource::new(data), &ctx, None);
});
