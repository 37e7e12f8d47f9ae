#![no_main]

use libfuzzer_sys::fuzz_target;

use fwrestore::Img3;

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    // first four bytes become the blob, the rest the container
    let (blob, container) = data.split_at(4);

    let mut image = match Img3::parse(container) {
        Ok(image) => image,
        Err(_err) => return,
    };

    image.replace_signature(blob);

    let reparsed = Img3::parse(&image.to_bytes()).expect("replacement must re-serialize cleanly");
    assert_eq!(reparsed.signature(), Some(blob));
});
