use chrono::{Duration, DurationRound, NaiveDate, NaiveDateTime, NaiveTime};

/// Format used for persisting timestamps. Lexical order equals chronological order, which the
/// queries rely on.
pub const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// This is the standard way of converting a date to a string in pomolog.
pub fn date_to_record_name(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn day_start(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Last representable minute of a day, 23:59.
pub fn day_last_minute(date: NaiveDate) -> NaiveDateTime {
    day_start(date) + Duration::days(1) - Duration::minutes(1)
}

pub fn truncate_to_minute(time: NaiveDateTime) -> NaiveDateTime {
    time.duration_trunc(Duration::minutes(1)).unwrap_or(time)
}

pub fn format_clock(time: NaiveDateTime) -> String {
    time.format("%H:%M:%S").to_string()
}

pub fn format_duration(v: Duration) -> String {
    if v.num_hours() > 0 {
        format!(
            "{}h{}m{}s",
            v.num_hours(),
            v.num_minutes() % 60,
            v.num_seconds() % 60
        )
    } else if v.num_minutes() > 0 {
        format!("{}m{}s", v.num_minutes() % 60, v.num_seconds() % 60)
    } else {
        format!("{}s", v.num_seconds() % 60)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::{day_last_minute, format_duration, truncate_to_minute};

    #[test]
    fn last_minute_of_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            day_last_minute(date),
            date.and_hms_opt(23, 59, 0).unwrap()
        );
    }

    #[test]
    fn truncation_drops_seconds() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let time = date.and_hms_milli_opt(14, 3, 59, 500).unwrap();
        assert_eq!(truncate_to_minute(time), date.and_hms_opt(14, 3, 0).unwrap());
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(Duration::seconds(42)), "42s");
        assert_eq!(format_duration(Duration::minutes(25)), "25m0s");
        assert_eq!(
            format_duration(Duration::hours(2) + Duration::minutes(3) + Duration::seconds(4)),
            "2h3m4s"
        );
    }
}
