//! Fuzz target: Modbus frame decoding.
//!
//! Arbitrary bytes go through both framers and, when a body survives the
//! check sequence, through `Response::parse`.  Accepted bodies must
//! re-encode to a frame that decodes to the same body.
//!
//! cargo fuzz run fuzz_modbus_frame

#![no_main]

use libfuzzer_sys::fuzz_target;
use nts_hardware::rs485::{Framer, Response};

fuzz_target!(|data: &[u8]| {
    for framer in [Framer::Ascii, Framer::Rtu] {
        if let Ok(body) = framer.decode(data) {
            let again = framer.decode(&framer.encode(&body));
            assert_eq!(again.as_deref(), Ok(&body[..]));
            if let Ok(resp) = Response::parse(&body) {
                assert!(resp.address.is_some());
                assert!(resp.data.len() <= 127);
            }
        }
    }
});
