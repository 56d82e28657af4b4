#![no_main]

use libfuzzer_sys::fuzz_target;
use sponge_types::{SseParser, StreamEvent};

// Arbitrary bytes split at an arbitrary point must never panic the parser or
// the event decoder.
fuzz_target!(|data: &[u8]| {
    let split = data.first().map(|b| *b as usize % (data.len() + 1)).unwrap_or(0);
    let (head, tail) = data.split_at(split);

    let mut parser = SseParser::new();
    for chunk in [head, tail] {
        for frame in parser.feed(chunk) {
            let _ = StreamEvent::from_frame(&frame);
        }
    }
    parser.finish();
});
