//! Calendar primitives: weekday sets, times of day and durations, all at five minute
//! granularity.

use core::fmt;
use core::ops::{Add, Sub};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// Minutes in a day; the only valid [`Time`] not below it is the end-of-day sentinel.
pub const MINUTES_PER_DAY: u16 = 24 * 60;
/// All times and durations are multiples of this many minutes.
pub const GRANULARITY: u16 = 5;

const DAY_LETTERS: [char; 7] = ['M', 'T', 'W', 'R', 'F', 'S', 'U'];
const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// A weekday index, Monday = 0 through Sunday = 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Day(u8);

impl Day {
    /// # Panics
    ///
    /// If `index` is not below 7.
    #[must_use]
    pub const fn new(index: u8) -> Self {
        assert!(index < 7, "weekday index out of range");
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn letter(self) -> char {
        DAY_LETTERS[self.0 as usize]
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        DAY_NAMES[self.0 as usize]
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An immutable set of weekdays, usable as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Days(u8);

impl Days {
    pub const EMPTY: Self = Self(0);
    pub const WEEKDAYS: Self = Self(0b001_1111);

    #[must_use]
    pub fn from_days(days: impl IntoIterator<Item = Day>) -> Self {
        Self(days.into_iter().fold(0, |acc, d| acc | (1 << d.0)))
    }

    #[must_use]
    pub const fn contains(self, day: Day) -> bool {
        self.0 & (1 << day.0) != 0
    }

    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Day> {
        (0..7).filter(move |i| self.0 & (1 << i) != 0).map(Day)
    }
}

impl FromStr for Days {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bits = 0u8;
        for c in s.chars() {
            let index = DAY_LETTERS
                .iter()
                .position(|&l| l == c.to_ascii_uppercase())
                .ok_or_else(|| DataError::InvalidDays(s.to_string()))?;
            bits |= 1 << index;
        }
        Ok(Self(bits))
    }
}

impl TryFrom<String> for Days {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Days> for String {
    fn from(days: Days) -> Self {
        days.to_string()
    }
}

impl fmt::Display for Days {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for day in self.iter() {
            write!(f, "{}", day.letter())?;
        }
        Ok(())
    }
}

/// A length of time in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub struct Duration(u16);

impl Duration {
    pub const ZERO: Self = Self(0);

    /// # Errors
    ///
    /// If `minutes` is negative, longer than a day, or not a multiple of five.
    pub fn new(minutes: i64) -> Result<Self, DataError> {
        u16::try_from(minutes)
            .ok()
            .filter(|&m| m <= MINUTES_PER_DAY && m % GRANULARITY == 0)
            .map(Self)
            .ok_or(DataError::InvalidDuration(minutes))
    }

    /// # Panics
    ///
    /// If `minutes` is not a valid duration. For use with constants.
    #[must_use]
    pub const fn from_minutes(minutes: u16) -> Self {
        assert!(minutes <= MINUTES_PER_DAY && minutes % GRANULARITY == 0, "invalid duration");
        Self(minutes)
    }

    #[must_use]
    pub const fn minutes(self) -> u16 {
        self.0
    }
}

impl TryFrom<i64> for Duration {
    type Error = DataError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Duration> for u16 {
    fn from(duration: Duration) -> Self {
        duration.0
    }
}

impl Add for Duration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Duration {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        assert!(self >= rhs, "negative duration: {self} - {rhs}");
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.0)
    }
}

/// A time of day in minutes since midnight.
///
/// Times read from input lie in `00:00..24:00`; `24:00` itself only arises as the end of a
/// slot that runs until midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Time(u16);

impl Time {
    /// # Errors
    ///
    /// If `minutes` is not below a day or not on a five minute boundary.
    pub fn new(minutes: u16) -> Result<Self, DataError> {
        if minutes < MINUTES_PER_DAY && minutes % GRANULARITY == 0 {
            Ok(Self(minutes))
        } else {
            Err(DataError::InvalidTime(format!("{minutes} minutes")))
        }
    }

    /// # Panics
    ///
    /// If the time is invalid. For use with constants.
    #[must_use]
    pub const fn hm(hour: u16, minute: u16) -> Self {
        let minutes = hour * 60 + minute;
        assert!(minutes < MINUTES_PER_DAY && minutes % GRANULARITY == 0, "invalid time");
        Self(minutes)
    }

    #[must_use]
    pub const fn minutes(self) -> u16 {
        self.0
    }

    /// Signed minutes from `earlier` to `self`; negative when `self` comes first.
    #[must_use]
    pub fn minutes_since(self, earlier: Self) -> i32 {
        i32::from(self.0) - i32::from(earlier.0)
    }
}

impl FromStr for Time {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DataError::InvalidTime(s.to_string());
        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hour: u16 = hour.parse().map_err(|_| invalid())?;
        let minute: u16 = minute.parse().map_err(|_| invalid())?;
        if hour >= 24 || minute >= 60 {
            return Err(invalid());
        }
        Self::new(hour * 60 + minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for Time {
    type Error = DataError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Time> for String {
    fn from(time: Time) -> Self {
        time.to_string()
    }
}

impl Add<Duration> for Time {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let minutes = self.0 + rhs.0;
        assert!(minutes <= MINUTES_PER_DAY, "{self} + {rhs} runs past midnight");
        Self(minutes)
    }
}

impl Sub<Duration> for Time {
    type Output = Self;

    fn sub(self, rhs: Duration) -> Self::Output {
        assert!(self.0 >= rhs.0, "{self} - {rhs} runs before midnight");
        Self(self.0 - rhs.0)
    }
}

impl Sub for Time {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Self::Output {
        assert!(self >= rhs, "negative duration: {self} - {rhs}");
        Duration(self.0 - rhs.0)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}
