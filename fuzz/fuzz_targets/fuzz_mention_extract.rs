#![no_main]

use libfuzzer_sys::fuzz_target;
use roomhub_realtime::extract_mentions;

fuzz_target!(|data: &[u8]| {
    let content = String::from_utf8_lossy(data);
    let mentions = extract_mentions(&content);

    for name in &mentions {
        assert!(!name.is_empty());
        assert!(content.contains(&format!("@{name}")));
    }
    let mut unique = mentions.clone();
    unique.sort_unstable();
    unique.dedup();
    assert_eq!(unique.len(), mentions.len());
});
