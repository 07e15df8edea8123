#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Compress arbitrary fuzz input with an independent encoder, then assert
    // puffin reproduces it bit-for-bit through both transcode directions.
    let deflated = miniz_oxide::deflate::compress_to_vec(data, 6);

    let puffed = match puffin::puff_to_vec(&deflated)
    {
        Ok(puffed) => puffed,
        Err(_) => return
    };

    let huffed = puffin::huff_to_vec(&puffed).expect("a stream this crate just puffed must huff back cleanly");

    assert_eq!(huffed, deflated, "puff/huff round trip diverged from the original DEFLATE stream");
});
