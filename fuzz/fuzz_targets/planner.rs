#![no_main]

use std::io::Cursor;

use ipv4_distinct_counter::planner::plan;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (u8, &[u8])| {
    let (workers, data) = input;
    let workers = usize::from(workers % 64) + 1;
    let ranges = plan(&mut Cursor::new(data), data.len() as u64, workers).unwrap();

    assert_eq!(ranges.len(), workers);
    assert_eq!(ranges[0].start, 0);
    assert_eq!(ranges[workers - 1].end, data.len() as u64);
    for pair in ranges.windows(2) {
        assert_eq!(pair[0].end, pair[1].start);
        let boundary = pair[0].end as usize;
        assert!(boundary == 0 || boundary == data.len() || data[boundary - 1] == b'\n');
    }
});
