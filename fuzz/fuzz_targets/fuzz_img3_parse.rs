#![no_main]

use libfuzzer_sys::fuzz_target;

use fwrestore::Img3;

fuzz_target!(|data: &[u8]| {
    let image = match Img3::parse(data) {
        Ok(image) => image,
        Err(_err) => return,
    };

    // anything that parses must re-serialize to the same bytes
    assert_eq!(image.to_bytes(), data);
});
