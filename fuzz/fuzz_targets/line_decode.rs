//! Fuzz target for the wire line decoder.
//!
//! Feeds arbitrary byte sequences to `decode_line`. The decoder must
//! never panic: every invalid input returns an error, oversized lines
//! are rejected before parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use roster_proto::decode_line;

fuzz_target!(|data: &[u8]| {
    let _ = decode_line(data);
});
