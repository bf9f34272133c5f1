#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(rows) = sorter_config::parse_sample_trace(data) {
        assert!(!rows.is_empty());
    }
});
