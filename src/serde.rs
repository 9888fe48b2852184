//! # Serde support
//!
//! `Config`, `Strategy`, `ParsePolicy`, `ByteRange` and `Phase` derive serde traits directly.
//! `CountReport` is serialized by hand so durations come out as fractional seconds, which is
//! what log pipelines and dashboards consuming the report expect:
//!
//! ```json
//! {"count":3,"strategy":"exact-memory","workers":4,"lines":5,"recorded":5,"skipped":0,
//!  "elapsed_ingest_secs":0.0012,"elapsed_reduce_secs":0.08}
//! ```
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::counter::CountReport;

impl Serialize for CountReport {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("CountReport", 8)?;
        state.serialize_field("count", &self.count)?;
        state.serialize_field("strategy", &self.strategy)?;
        state.serialize_field("workers", &self.workers)?;
        state.serialize_field("lines", &self.lines)?;
        state.serialize_field("recorded", &self.recorded)?;
        state.serialize_field("skipped", &self.skipped)?;
        state.serialize_field("elapsed_ingest_secs", &self.elapsed_ingest.as_secs_f64())?;
        state.serialize_field("elapsed_reduce_secs", &self.elapsed_reduce.as_secs_f64())?;
        state.end()
    }
}

#[cfg(test)]
pub mod tests {
    use std::time::Duration;

    use crate::config::{Config, Strategy};
    use crate::counter::CountReport;
    use crate::scanner::ParsePolicy;
    use test_case::test_case;

    #[test_case(Strategy::ExactMemory, "\"exact-memory\"")]
    #[test_case(Strategy::ExactDisk, "\"exact-disk\"")]
    #[test_case(Strategy::ApproximateHll, "\"approximate-hll\"")]
    fn test_strategy_names(strategy: Strategy, json: &str) {
        assert_eq!(serde_json::to_string(&strategy).unwrap(), json);
        assert_eq!(serde_json::from_str::<Strategy>(json).unwrap(), strategy);
    }

    #[test]
    fn test_config_round_trip() {
        let config = Config::new("ips.txt")
            .with_workers(10)
            .with_strategy(Strategy::ExactDisk)
            .with_bitmap_path("bitmap.dat")
            .with_parse_policy(ParsePolicy::Strict);
        let json = serde_json::to_string(&config).expect("serialization failed");
        let deserialized: Config = serde_json::from_str(&json).expect("deserialization failed");
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_report_durations_in_seconds() {
        let report = CountReport {
            count: 3,
            strategy: Strategy::ExactMemory,
            workers: 4,
            lines: 5,
            recorded: 5,
            skipped: 0,
            elapsed_ingest: Duration::from_millis(1500),
            elapsed_reduce: Duration::from_millis(250),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["count"], 3);
        assert_eq!(value["strategy"], "exact-memory");
        assert_eq!(value["elapsed_ingest_secs"], 1.5);
        assert_eq!(value["elapsed_reduce_secs"], 0.25);
    }

    #[test_case("{ invalid_json_string }"; "invalid json")]
    #[test_case("\"exact\""; "unknown strategy")]
    fn test_failed_strategy_deserialization(input: &str) {
        assert!(serde_json::from_str::<Strategy>(input).is_err());
    }
}
