//! Scan-date schedule.
//!
//! A scan covers two reporting windows: companies reporting after today's
//! close (the "post" date) and companies reporting before the next
//! session's open (the "pre" date).

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::US::Eastern;

/// US equity close, Eastern wall-clock hour.
const CLOSE_HOUR_ET: u32 = 16;

/// The post-market reporting date implied by the current time: today
/// while the session is still open, otherwise the next calendar day.
/// Evaluated in US/Eastern so the boundary holds across DST changes.
pub fn post_date(now: DateTime<Utc>) -> NaiveDate {
    let eastern = now.with_timezone(&Eastern);
    if eastern.hour() < CLOSE_HOUR_ET {
        eastern.date_naive()
    } else {
        eastern.date_naive() + chrono::Duration::days(1)
    }
}

/// Next business day after the post date, skipping weekends.
pub fn pre_date(post: NaiveDate) -> NaiveDate {
    let days = match post.weekday() {
        Weekday::Fri => 3,
        Weekday::Sat => 2,
        _ => 1,
    };
    post + chrono::Duration::days(days)
}

/// Resolve the (post, pre) date pair from an explicit date or the clock.
pub fn resolve(input: Option<NaiveDate>, now: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
    let post = input.unwrap_or_else(|| post_date(now));
    (post, pre_date(post))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_post_date_before_close_is_today() {
        let now = Utc.with_ymd_and_hms(2025, 3, 19, 15, 0, 0).unwrap();
        assert_eq!(post_date(now), d(2025, 3, 19));
    }

    #[test]
    fn test_post_date_after_close_rolls_forward() {
        let now = Utc.with_ymd_and_hms(2025, 3, 19, 21, 30, 0).unwrap();
        assert_eq!(post_date(now), d(2025, 3, 20));
    }

    #[test]
    fn test_post_date_boundary_in_standard_time() {
        // January runs UTC-5: 20:30 UTC is 15:30 ET, still pre-close.
        let open = Utc.with_ymd_and_hms(2025, 1, 15, 20, 30, 0).unwrap();
        assert_eq!(post_date(open), d(2025, 1, 15));
        // 21:30 UTC is 16:30 ET, after the close.
        let closed = Utc.with_ymd_and_hms(2025, 1, 15, 21, 30, 0).unwrap();
        assert_eq!(post_date(closed), d(2025, 1, 16));
    }

    #[test]
    fn test_post_date_uses_eastern_calendar_day() {
        // 02:00 UTC is 21:00 ET the previous evening; post-close there,
        // so the post date is the (UTC) current day, not the day after.
        let now = Utc.with_ymd_and_hms(2025, 1, 16, 2, 0, 0).unwrap();
        assert_eq!(post_date(now), d(2025, 1, 16));
    }

    #[test]
    fn test_pre_date_midweek() {
        // Wednesday -> Thursday
        assert_eq!(pre_date(d(2025, 3, 19)), d(2025, 3, 20));
    }

    #[test]
    fn test_pre_date_skips_weekend() {
        // Friday -> Monday
        assert_eq!(pre_date(d(2025, 3, 21)), d(2025, 3, 24));
        // Saturday -> Monday
        assert_eq!(pre_date(d(2025, 3, 22)), d(2025, 3, 24));
    }

    #[test]
    fn test_explicit_date_wins() {
        let now = Utc.with_ymd_and_hms(2025, 3, 19, 22, 0, 0).unwrap();
        let (post, pre) = resolve(Some(d(2025, 6, 6)), now);
        assert_eq!(post, d(2025, 6, 6));
        // June 6 2025 is a Friday.
        assert_eq!(pre, d(2025, 6, 9));
    }
}
