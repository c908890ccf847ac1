#![no_main]

use libfuzzer_sys::fuzz_target;
use lastivka_memory::normalize::{normalize_key, similarity, stem, tokenize, within_one_edit};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);

    let key = normalize_key(&raw);
    assert_eq!(normalize_key(&key), key);

    for token in tokenize(&raw) {
        assert!(token.chars().count() >= 2);
        let _ = stem(&token);
    }

    let ratio = similarity(&raw, &key);
    assert!((0.0..=1.0).contains(&ratio));
    assert!(within_one_edit(&key, &key));
});
