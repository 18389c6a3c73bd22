//! Fuzz target for inbound frame decoding.
//!
//! Arbitrary client text must decode or be refused, never panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use roomhub_realtime::InboundEvent;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    if let Ok(event) = InboundEvent::decode(&text) {
        let _ = event.kind();
    }
});
