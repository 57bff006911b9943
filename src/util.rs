use chrono::{DateTime, FixedOffset, Offset, TimeDelta, Utc};

use crate::geo::Coordinate;

/// Elapsed time between check-in and `now`, clamped at zero for clock skew
pub fn worked_duration(check_in: DateTime<Utc>, now: DateTime<Utc>) -> TimeDelta {
    (now - check_in).max(TimeDelta::zero())
}

/// Fractional hours, for comparison against the minimum
pub fn worked_hours(check_in: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    worked_duration(check_in, now).num_milliseconds() as f64 / 3_600_000.0
}

/// `"{h}h {m}m"` with floored hours and remainder minutes
pub fn format_worked(worked: TimeDelta) -> String {
    let total_minutes = worked.num_minutes().max(0);
    format!("{}h {}m", total_minutes / 60, total_minutes % 60)
}

/// Offset used for on-screen times; falls back to UTC when out of range
pub fn display_offset(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60)).unwrap_or(Utc.fix())
}

/// 12-hour clock text such as `"2:30:00 PM"`
pub fn format_clock(at: DateTime<Utc>, offset: FixedOffset) -> String {
    at.with_timezone(&offset).format("%-I:%M:%S %p").to_string()
}

pub fn format_location(coordinate: Coordinate) -> String {
    format!("Location: {coordinate}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, m, s).unwrap()
    }

    #[test]
    fn test_format_worked_floors_hours_and_minutes() {
        assert_eq!(format_worked(TimeDelta::hours(2)), "2h 0m");
        assert_eq!(format_worked(TimeDelta::minutes(7 * 60 + 59)), "7h 59m");
        assert_eq!(format_worked(TimeDelta::seconds(59)), "0h 0m");
        assert_eq!(format_worked(TimeDelta::seconds(9 * 3600 + 61)), "9h 1m");
    }

    #[test]
    fn test_worked_duration_clamps_negative() {
        assert_eq!(worked_duration(at(10, 0, 0), at(9, 0, 0)), TimeDelta::zero());
        assert_eq!(worked_duration(at(9, 0, 0), at(11, 30, 0)), TimeDelta::minutes(150));
    }

    #[test]
    fn test_worked_hours_fractional() {
        assert_eq!(worked_hours(at(9, 0, 0), at(11, 30, 0)), 2.5);
        assert!(worked_hours(at(9, 0, 0), at(16, 59, 59)) < 8.0);
        assert_eq!(worked_hours(at(9, 0, 0), at(17, 0, 0)), 8.0);
    }

    #[test]
    fn test_format_clock_uses_offset() {
        let ist = display_offset(330);
        assert_eq!(format_clock(at(9, 0, 0), ist), "2:30:00 PM");
        assert_eq!(format_clock(at(0, 5, 9), display_offset(0)), "12:05:09 AM");
    }

    #[test]
    fn test_display_offset_out_of_range_falls_back_to_utc() {
        assert_eq!(display_offset(100_000).local_minus_utc(), 0);
    }

    #[test]
    fn test_format_location() {
        assert_eq!(
            format_location(Coordinate::new(37.4221, -122.0841)),
            "Location: 37.42210, -122.08410"
        );
    }
}
