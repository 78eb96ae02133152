#![no_main]

use cdrstat_core::{ReplyEnvelope, ReportRequest};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(request) = ReportRequest::from_slice(data) {
        let distinct = request.distinct_phones();
        assert!(distinct.len() <= request.phones.len());
    }

    let _ = ReplyEnvelope::from_slice(data);
});
