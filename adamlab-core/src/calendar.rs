//! Business-day calendars for projection date stepping.
//!
//! Pure logic, no I/O. Weekends are never business days; holiday sets are
//! optional and supplied by the caller.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Decides which calendar dates are trading days.
pub trait BusinessCalendar: Send + Sync {
    fn is_business_day(&self, date: NaiveDate) -> bool;

    /// The first business day strictly after `date`.
    fn next_business_day(&self, date: NaiveDate) -> NaiveDate {
        let mut d = date;
        loop {
            d = d.succ_opt().unwrap_or(NaiveDate::MAX);
            if d == NaiveDate::MAX || self.is_business_day(d) {
                return d;
            }
        }
    }

    /// `date` advanced by `n` business days. `n == 0` returns `date` unchanged.
    fn add_business_days(&self, date: NaiveDate, n: usize) -> NaiveDate {
        (0..n).fold(date, |d, _| self.next_business_day(d))
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Monday to Friday, no holidays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeekdayCalendar;

impl BusinessCalendar for WeekdayCalendar {
    fn is_business_day(&self, date: NaiveDate) -> bool {
        !is_weekend(date)
    }
}

/// Weekdays minus an explicit holiday set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl HolidayCalendar {
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    pub fn holidays(&self) -> impl Iterator<Item = &NaiveDate> {
        self.holidays.iter()
    }

    pub fn len(&self) -> usize {
        self.holidays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holidays.is_empty()
    }
}

impl BusinessCalendar for HolidayCalendar {
    fn is_business_day(&self, date: NaiveDate) -> bool {
        !is_weekend(date) && !self.holidays.contains(&date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn friday_steps_to_monday() {
        // 2024-01-05 is a Friday
        assert_eq!(WeekdayCalendar.next_business_day(d(2024, 1, 5)), d(2024, 1, 8));
    }

    #[test]
    fn weekend_start_steps_to_monday() {
        assert_eq!(WeekdayCalendar.next_business_day(d(2024, 1, 6)), d(2024, 1, 8));
        assert_eq!(WeekdayCalendar.next_business_day(d(2024, 1, 7)), d(2024, 1, 8));
    }

    #[test]
    fn add_business_days_spans_weekends() {
        // Wed + 5 business days = next Wed
        assert_eq!(WeekdayCalendar.add_business_days(d(2024, 1, 3), 5), d(2024, 1, 10));
        assert_eq!(WeekdayCalendar.add_business_days(d(2024, 1, 3), 0), d(2024, 1, 3));
    }

    #[test]
    fn holidays_are_skipped() {
        let cal = HolidayCalendar::new([d(2024, 12, 25)]);
        // Tue 2024-12-24 -> skip Wed 25 -> Thu 26
        assert_eq!(cal.next_business_day(d(2024, 12, 24)), d(2024, 12, 26));
        assert!(!cal.is_business_day(d(2024, 12, 28)));
        assert!(cal.is_business_day(d(2024, 12, 27)));
    }

    #[test]
    fn empty_holiday_calendar_matches_weekdays() {
        let cal = HolidayCalendar::default();
        let start = d(2024, 3, 1);
        for n in 0..20 {
            assert_eq!(
                cal.add_business_days(start, n),
                WeekdayCalendar.add_business_days(start, n)
            );
        }
    }
}
