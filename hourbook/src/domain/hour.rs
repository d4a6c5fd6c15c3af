use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const HOURS_PER_DAY: i32 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid hour: {0:?}")]
pub struct InvalidHour(pub String);

/// Parses the hour part of `"7"`, `"07"`, `"7:00"` or `"07:00"`.
fn parse_hour(s: &str) -> Result<u8, InvalidHour> {
    let trimmed = s.trim();
    let hour_part = match trimmed.split_once(':') {
        Some((hour, minutes)) if minutes == "00" => hour,
        Some(_) => return Err(InvalidHour(s.to_string())),
        None => trimmed,
    };
    if hour_part.is_empty() || hour_part.len() > 2 || !hour_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(InvalidHour(s.to_string()));
    }
    match hour_part.parse::<u8>() {
        Ok(hour) if hour < 24 => Ok(hour),
        _ => Err(InvalidHour(s.to_string())),
    }
}

macro_rules! hour_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "u8", into = "u8")]
        pub struct $name(u8);

        impl $name {
            pub const MIN: Self = Self(0);
            pub const MAX: Self = Self(23);

            pub fn new(hour: u8) -> Option<Self> {
                (hour < 24).then_some(Self(hour))
            }

            pub fn get(self) -> u8 {
                self.0
            }

            /// All 24 buckets in ascending order.
            pub fn all() -> impl Iterator<Item = Self> {
                (0..24).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:02}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = InvalidHour;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_hour(s).map(Self)
            }
        }

        impl TryFrom<u8> for $name {
            type Error = InvalidHour;

            fn try_from(hour: u8) -> Result<Self, Self::Error> {
                Self::new(hour).ok_or_else(|| InvalidHour(hour.to_string()))
            }
        }

        impl From<$name> for u8 {
            fn from(hour: $name) -> Self {
                hour.0
            }
        }
    };
}

hour_newtype!(
    /// Hour-of-day bucket in the backend's storage timezone.
    StorageHour
);

hour_newtype!(
    /// Hour-of-day bucket as shown to the user.
    ///
    /// Renders zero-padded (`"09"`), which is also the key format of the edit overlay.
    DisplayHour
);

impl DisplayHour {
    /// For hour literals; out-of-range input fails const evaluation.
    pub(crate) const fn from_literal(hour: u8) -> Self {
        assert!(hour < 24, "hour out of range");
        Self(hour)
    }
}

/// Fixed offset between storage and display hours.
///
/// Both directions go through this type so the inverse never gets hand-rolled
/// with a different rounding somewhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeShifter {
    offset_hours: i32,
}

impl TimeShifter {
    pub fn new(offset_hours: i32) -> Self {
        Self { offset_hours }
    }

    pub fn offset_hours(&self) -> i32 {
        self.offset_hours
    }

    pub fn to_display(&self, hour: StorageHour) -> DisplayHour {
        let shifted = (i32::from(hour.get()) + self.offset_hours).rem_euclid(HOURS_PER_DAY);
        DisplayHour(shifted as u8)
    }

    pub fn to_storage(&self, hour: DisplayHour) -> StorageHour {
        let shifted = (i32::from(hour.get()) - self.offset_hours).rem_euclid(HOURS_PER_DAY);
        StorageHour(shifted as u8)
    }
}

impl Default for TimeShifter {
    /// The deployment's observed offset, UTC+3.
    fn default() -> Self {
        Self::new(3)
    }
}
