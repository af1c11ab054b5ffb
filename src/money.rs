//! A fixed-point amount of money.

use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Serialize, Serializer};

use crate::Error;

/// A signed amount of money stored as a whole number of cents.
///
/// Balances are updated by adding and subtracting amounts many times over,
/// so amounts are kept as integers to avoid accumulating rounding errors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl Money {
    /// An amount of zero.
    pub const ZERO: Money = Money(0);

    /// The largest amount that can be entered, twelve digits with two after
    /// the decimal point.
    pub const MAX: Money = Money(9_999_999_999_99);

    /// Create an amount from a whole number of cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// The amount as a whole number of cents.
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whether the amount is strictly greater than zero.
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Whether the size of the amount is at most [Money::MAX].
    pub const fn is_within_limit(&self) -> bool {
        self.0.unsigned_abs() <= Self::MAX.0 as u64
    }

    /// The amount in dollars, for display and JSON output only.
    ///
    /// Exact for any amount within [Money::MAX]. Larger amounts may lose
    /// cents.
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl FromStr for Money {
    type Err = Error;

    /// Parse a decimal amount such as `12`, `-4.5` or `$1,234.56`.
    ///
    /// # Errors
    ///
    /// Returns [Error::InvalidAmount] if the text is not a number with at most
    /// two decimal places, or if its size is larger than [Money::MAX].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidAmount(s.to_owned());

        let cleaned: String = s
            .trim()
            .chars()
            .filter(|c| *c != ',' && *c != '$')
            .collect();

        let (negative, digits) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };

        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }

        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
            || fraction.len() > 2
        {
            return Err(invalid());
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };

        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };

        let cents = whole
            .checked_mul(100)
            .and_then(|cents| cents.checked_add(fraction))
            .ok_or_else(invalid)?;

        let amount = Self(if negative { -cents } else { cents });
        if !amount.is_within_limit() {
            return Err(invalid());
        }

        Ok(amount)
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();

        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl ToSql for Money {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for Money {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(Money)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |total, amount| total + amount)
    }
}
