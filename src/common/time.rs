//! Time helpers shared by the parser (duration literals) and callers (timestamps).

use crate::common::types::Timestamp;

/// Returns the current time since UNIX_EPOCH in milliseconds.
pub fn current_time_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}

/// Duration unit multipliers to milliseconds, per `spec.md` §6.
const MS: i64 = 1000;
const MINUTE: i64 = 60 * MS;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const YEAR: i64 = 365 * DAY;

/// Converts a unit letter (`s|m|h|d|w|y`) to its millisecond multiplier.
pub fn unit_multiplier_ms(unit: char) -> Option<i64> {
    match unit {
        's' => Some(MS),
        'm' => Some(MINUTE),
        'h' => Some(HOUR),
        'd' => Some(DAY),
        'w' => Some(WEEK),
        'y' => Some(YEAR),
        _ => None,
    }
}

/// Parses a duration literal of the form `<number><unit>` into milliseconds.
///
/// `number` may be an integer or a decimal/scientific literal; `unit` is one
/// of `s|m|h|d|w|y`. Grounded in `Parser::parse_duration` from
/// `examples/original_source/src/parse/parser.cpp`.
pub fn parse_duration_ms(literal: &str) -> Option<i64> {
    let unit = literal.chars().last()?;
    let multiplier = unit_multiplier_ms(unit)?;
    let number_part = &literal[..literal.len() - unit.len_utf8()];
    let value: f64 = number_part.parse().ok()?;
    Some((value * multiplier as f64).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("1h", 3_600_000)]
    #[test_case("1y", 31_536_000_000)]
    #[test_case("1w", 604_800_000)]
    #[test_case("30s", 30_000)]
    #[test_case("1.5m", 90_000)]
    fn duration_round_trip(literal: &str, expected_ms: i64) {
        assert_eq!(parse_duration_ms(literal), Some(expected_ms));
    }
}
