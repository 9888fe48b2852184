#![no_main]

use ipv4_distinct_counter::parse::{format_ipv4, parse_ipv4};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Some(ip) = parse_ipv4(data) {
        assert_eq!(parse_ipv4(format_ipv4(ip).as_bytes()), Some(ip));
    }
});
