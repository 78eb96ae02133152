#![no_main]

use cdrstat_storage::decode_block;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Blocks are arbitrary byte windows of the store: they may start or end
    // mid-record, mid-string, or mid-number. Decoding must return an error
    // rather than panic.
    if let Ok(records) = decode_block(data) {
        for record in &records {
            let _ = record.duration();
        }
    }
});
