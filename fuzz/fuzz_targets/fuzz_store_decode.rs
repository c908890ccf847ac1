#![no_main]

use libfuzzer_sys::fuzz_target;
use lastivka_memory::merge::{decode_memory_map, merge_sources, parse_document};
use lastivka_memory::{InvertedIndex, SearchOptions};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let Some(document) = parse_document(&raw) else {
        return;
    };

    let (memory, _triggers) = decode_memory_map(document);
    assert!(memory.values().all(|records| !records.is_empty()));

    let merged = merge_sources(&memory, &memory);
    let index = InvertedIndex::build(&merged);
    let results = index.search(&merged, &raw, &SearchOptions::new(3));
    assert!(results.len() <= 3);
    assert!(results.iter().all(|result| result.score >= 0.0));
});
