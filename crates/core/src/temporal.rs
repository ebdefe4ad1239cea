//! Age and elapsed-time helpers.
//!
//! Unusable inputs never raise: ages default to 0, durations to `None`.

use chrono::{DateTime, Datelike, NaiveDate, Utc};

/// Age in whole years on `today`.
///
/// A missing birth date, or one after `today`, yields 0. Patients with age 0 fall below the
/// protected-care-pathway minimum and are therefore excluded from those beds.
pub fn age_on(birth_date: Option<NaiveDate>, today: NaiveDate) -> u32 {
    let Some(birth_date) = birth_date else {
        return 0;
    };
    if birth_date > today {
        return 0;
    }

    let mut years = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    u32::try_from(years).unwrap_or(0)
}

/// Whole minutes from `start` to `end`, or `None` when the start is unknown or later than
/// the end.
pub fn minutes_between(start: Option<DateTime<Utc>>, end: DateTime<Utc>) -> Option<i64> {
    let minutes = end.signed_duration_since(start?).num_minutes();
    (minutes >= 0).then_some(minutes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn age_counts_completed_years() {
        let today = date(2024, 6, 15);
        assert_eq!(age_on(Some(date(2006, 6, 15)), today), 18);
        assert_eq!(age_on(Some(date(2006, 6, 16)), today), 17);
        assert_eq!(age_on(Some(date(1964, 1, 1)), today), 60);
    }

    #[test]
    fn leap_day_birthdays() {
        assert_eq!(age_on(Some(date(2000, 2, 29)), date(2018, 2, 28)), 17);
        assert_eq!(age_on(Some(date(2000, 2, 29)), date(2018, 3, 1)), 18);
    }

    #[test]
    fn missing_or_future_birth_date_is_zero() {
        let today = date(2024, 6, 15);
        assert_eq!(age_on(None, today), 0);
        assert_eq!(age_on(Some(date(2030, 1, 1)), today), 0);
    }

    #[test]
    fn minutes_between_handles_unknown_start() {
        let end = Utc
            .with_ymd_and_hms(2024, 5, 1, 10, 42, 30)
            .single()
            .expect("valid datetime");
        assert_eq!(minutes_between(Some(end - Duration::minutes(42)), end), Some(42));
        assert_eq!(minutes_between(None, end), None);
        assert_eq!(minutes_between(Some(end + Duration::minutes(5)), end), None);
    }
}
