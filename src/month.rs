//! Calendar months used to scope budgets and monthly totals.

use std::{cmp::Ordering, fmt::Display, str::FromStr};

use serde::{Serialize, Serializer};
use time::{Date, Month};

use crate::Error;

/// A month of a particular year, e.g. March 2025.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct YearMonth {
    year: i32,
    month: Month,
}

impl YearMonth {
    /// Create a month from a year and a month of that year.
    pub const fn new(year: i32, month: Month) -> Self {
        Self { year, month }
    }

    /// The month that `date` falls in.
    pub fn containing(date: Date) -> Self {
        Self::new(date.year(), date.month())
    }

    /// The year.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// The month of the year.
    pub fn month(&self) -> Month {
        self.month
    }

    /// The first day of the month.
    pub fn first_day(&self) -> Date {
        // Every month has a first day, and `year` always comes from a valid date.
        Date::from_calendar_date(self.year, self.month, 1).unwrap_or(Date::MIN)
    }

    /// The first day of the following month.
    ///
    /// Together with [YearMonth::first_day] this gives the half-open range
    /// `[first_day, next_first_day)` covering every day of the month.
    pub fn next_first_day(&self) -> Date {
        self.next().first_day()
    }

    /// The following month, rolling December over into January.
    pub fn next(&self) -> Self {
        match self.month {
            Month::December => Self::new(self.year + 1, Month::January),
            month => Self::new(self.year, month.next()),
        }
    }
}

impl Ord for YearMonth {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.year, self.month as u8).cmp(&(other.year, other.month as u8))
    }
}

impl PartialOrd for YearMonth {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for YearMonth {
    type Err = Error;

    /// Parse a month written as `YYYY-MM`.
    ///
    /// A full `YYYY-MM-DD` date is also accepted and normalised to its month.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidMonth(s.to_owned());
        let mut parts = s.trim().split('-');

        let year: i32 = parts
            .next()
            .filter(|year| year.len() == 4)
            .and_then(|year| year.parse().ok())
            .ok_or_else(invalid)?;
        let month: u8 = parts
            .next()
            .filter(|month| month.len() == 2)
            .and_then(|month| month.parse().ok())
            .ok_or_else(invalid)?;
        let month = Month::try_from(month).map_err(|_| invalid())?;

        match (parts.next(), parts.next()) {
            (None, None) => Ok(Self::new(year, month)),
            (Some(day), None) => {
                let day: u8 = day.parse().map_err(|_| invalid())?;
                Date::from_calendar_date(year, month, day).map_err(|_| invalid())?;
                Ok(Self::new(year, month))
            }
            _ => Err(invalid()),
        }
    }
}

impl Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month as u8)
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
