//! Generation calendar: the fixed horizon every event must fall inside.

use crate::error::ConfigError;
use crate::types::SimDate;
use chrono::{Datelike, Duration, Months, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Horizon {
    pub start: SimDate,
    pub end:   SimDate,
}

impl Horizon {
    pub fn new(start: SimDate, end: SimDate) -> Result<Self, ConfigError> {
        let horizon = Self { start, end };
        horizon.validate()?;
        Ok(horizon)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.end < self.start {
            return Err(ConfigError::InvertedHorizon { start: self.start, end: self.end });
        }
        Ok(())
    }

    pub fn contains(&self, date: SimDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Pull a date back onto the horizon end if it runs past it.
    pub fn cap(&self, date: SimDate) -> SimDate {
        date.min(self.end)
    }

    /// Calendar months overlapping the horizon, first to last.
    pub fn months(&self) -> MonthIter {
        MonthIter { next: first_of_month(self.start), horizon: *self }
    }
}

/// One calendar month, clipped to the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthSpan {
    pub first_day:     SimDate,
    pub last_day:      SimDate,
    pub days_in_month: i64,
}

impl MonthSpan {
    /// Days of this month that fall inside the horizon.
    pub fn days_within(&self, horizon: &Horizon) -> impl Iterator<Item = SimDate> {
        let from = self.first_day.max(horizon.start);
        let to = self.last_day.min(horizon.end);
        let span = (to - from).num_days();
        (0..=span).map(move |offset| add_days(from, offset))
    }
}

pub struct MonthIter {
    next:    SimDate,
    horizon: Horizon,
}

impl Iterator for MonthIter {
    type Item = MonthSpan;

    fn next(&mut self) -> Option<MonthSpan> {
        if self.next > self.horizon.end {
            return None;
        }
        let first_day = self.next;
        let following = first_of_month(first_day + Duration::days(32));
        let last_day = following - Duration::days(1);
        self.next = following;
        Some(MonthSpan {
            first_day,
            last_day,
            days_in_month: (following - first_day).num_days(),
        })
    }
}

pub fn first_of_month(date: SimDate) -> SimDate {
    date - Duration::days(date.day0() as i64)
}

pub fn add_days(date: SimDate, days: i64) -> SimDate {
    date + Duration::days(days)
}

/// Same day-of-month `months` earlier, clamped to the month's last day.
pub fn months_before(date: SimDate, months: u32) -> SimDate {
    date.checked_sub_months(Months::new(months)).unwrap_or(date)
}

pub fn days_between(from: SimDate, to: SimDate) -> i64 {
    (to - from).num_days()
}

pub fn is_weekend(date: SimDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> SimDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn months_cover_leap_february() {
        let horizon = Horizon::new(d(2024, 1, 15), d(2024, 3, 2)).unwrap();
        let months: Vec<_> = horizon.months().collect();
        assert_eq!(months.len(), 3);
        assert_eq!(months[1].days_in_month, 29);
        assert_eq!(months[0].days_within(&horizon).count(), 17);
        assert_eq!(months[2].days_within(&horizon).count(), 2);
    }

    #[test]
    fn months_before_clamps_to_month_end() {
        assert_eq!(months_before(d(2024, 3, 31), 1), d(2024, 2, 29));
        assert_eq!(months_before(d(2024, 12, 31), 12), d(2023, 12, 31));
    }

    #[test]
    fn inverted_horizon_rejected() {
        assert!(Horizon::new(d(2024, 2, 1), d(2024, 1, 1)).is_err());
    }
}
