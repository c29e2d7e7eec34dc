use anyhow::Error;
use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::Serialize;

/// Granularity of a displayed period. Weeks start on Monday; months and years
/// are calendar-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Week,
    Month,
    Year,
}

impl Granularity {
    pub fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "week" => Ok(Granularity::Week),
            "month" => Ok(Granularity::Month),
            "year" => Ok(Granularity::Year),
            _ => Err(Error::msg(format!("Unknown granularity: {}", s))),
        }
    }
}

/// Half-open period [start, end) aligned to the granularity containing
/// `cursor`, plus the inclusive date range used for row filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: NaiveDate,
    pub end_exclusive: NaiveDate,
}

impl Period {
    pub fn containing(cursor: NaiveDate, view: Granularity) -> Self {
        let start = match view {
            Granularity::Week => start_of_week_monday(cursor),
            Granularity::Month => cursor.with_day(1).unwrap_or(cursor),
            Granularity::Year => NaiveDate::from_ymd_opt(cursor.year(), 1, 1).unwrap_or(cursor),
        };
        let end_exclusive = match view {
            Granularity::Week => start + Days::new(7),
            Granularity::Month => start + Months::new(1),
            Granularity::Year => start + Months::new(12),
        };
        Period {
            start,
            end_exclusive,
        }
    }

    /// The immediately preceding period of the same granularity.
    pub fn previous(&self, view: Granularity) -> Self {
        let start = match view {
            Granularity::Week => self.start - Days::new(7),
            Granularity::Month => self.start - Months::new(1),
            Granularity::Year => self.start - Months::new(12),
        };
        Period {
            start,
            end_exclusive: self.start,
        }
    }

    /// Last date inside the period, for inclusive `workout_date` filters.
    pub fn last_day(&self) -> NaiveDate {
        self.end_exclusive - Days::new(1)
    }
}

pub fn start_of_week_monday(date: NaiveDate) -> NaiveDate {
    date - Days::new(date.weekday().num_days_from_monday() as u64)
}

/// ISO 8601 week number (week 1 contains the year's first Thursday).
pub fn iso_week_number(date: NaiveDate) -> u32 {
    date.iso_week().week()
}

/// The Monday-start week containing `date`, as 7 consecutive days.
pub fn week_days(date: NaiveDate) -> Vec<NaiveDate> {
    let monday = start_of_week_monday(date);
    (0..7).map(|i| monday + Days::new(i)).collect()
}

/// The month containing `cursor`, padded to full Monday–Sunday weeks so the
/// grid always renders complete rows. Days outside the month are included
/// (dimmed by the client).
pub fn month_grid(cursor: NaiveDate) -> Vec<Vec<NaiveDate>> {
    let first = cursor.with_day(1).unwrap_or(cursor);
    let last = first + Months::new(1) - Days::new(1);

    let grid_start = start_of_week_monday(first);
    let mut grid_end = last;
    while grid_end.weekday() != Weekday::Sun {
        grid_end = grid_end + Days::new(1);
    }

    let mut weeks = Vec::new();
    let mut cur = grid_start;
    while cur <= grid_end {
        weeks.push((0..7).map(|i| cur + Days::new(i)).collect());
        cur = cur + Days::new(7);
    }
    weeks
}
