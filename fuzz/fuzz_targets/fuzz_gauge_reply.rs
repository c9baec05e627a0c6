//! Fuzz target: Erstevak reply parsing.
//!
//! The first byte picks the expected address.  Any reply that parses
//! must carry it, and decoded pressures are never negative.
//!
//! cargo fuzz run fuzz_gauge_reply

#![no_main]

use libfuzzer_sys::fuzz_target;
use nts_hardware::vacuum_gauge::erstevak::protocol::parse_response;

fuzz_target!(|data: &[u8]| {
    let Some((&address, reply)) = data.split_first() else {
        return;
    };
    if let Ok(resp) = parse_response(reply, address) {
        assert_eq!(resp.address, address);
        if let Some(p) = resp.pressure {
            assert!(p >= 0.0);
        }
    }
});
