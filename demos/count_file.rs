use std::io::Write;

use ipv4_distinct_counter::config::{Config, Strategy};
use ipv4_distinct_counter::counter::count_distinct;

fn main() {
    let mut input = tempfile::NamedTempFile::new().unwrap();
    for line in ["1.1.1.1", "1.1.1.1", "2.2.2.2", "3.3.3.3", "2.2.2.2", "not.an.ip"] {
        writeln!(input, "{line}").unwrap();
    }
    input.flush().unwrap();
    let bitmap_dir = tempfile::tempdir().unwrap();

    for strategy in Strategy::ALL {
        let config = Config::new(input.path())
            .with_workers(4)
            .with_strategy(strategy)
            .with_bitmap_path(bitmap_dir.path().join("bitmap.dat"));
        let report = count_distinct(config).unwrap();
        println!("{strategy} estimate = {}", report.count);
        println!("{report}");
    }
}
