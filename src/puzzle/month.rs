use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use time::{Date, Month, OffsetDateTime};

/// `YYYY-MM` key naming one puzzle generation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthKey {
    year: i32,
    month: Month,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid month key {0:?}, expected YYYY-MM")]
pub struct InvalidMonthKey(pub String);

impl MonthKey {
    pub const fn new(year: i32, month: Month) -> Self {
        Self { year, month }
    }

    /// Month of the current UTC date.
    pub fn current() -> Self {
        Self::from_date(OffsetDateTime::now_utc().date())
    }

    pub fn from_date(date: Date) -> Self {
        Self::new(date.year(), date.month())
    }

    /// English month name, e.g. `October`.
    pub fn month_name(&self) -> String {
        self.month.to_string()
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, u8::from(self.month))
    }
}

impl FromStr for MonthKey {
    type Err = InvalidMonthKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidMonthKey(s.to_string());
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        let month = month
            .parse::<u8>()
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .ok_or_else(invalid)?;
        Ok(Self::new(year, month))
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn formats_as_year_dash_month() {
        let key = MonthKey::from_date(date!(2025 - 03 - 17));
        assert_eq!(key.to_string(), "2025-03");
        assert_eq!(key.month_name(), "March");
    }

    #[test]
    fn parses_its_own_output() {
        let key: MonthKey = "2024-12".parse().unwrap();
        assert_eq!(key, MonthKey::new(2024, Month::December));
        assert_eq!(key.to_string(), "2024-12");
    }

    #[test]
    fn rejects_malformed_keys() {
        for bad in ["2024-13", "2024-00", "24-01", "2024-1", "2024/01", "", "abcd-ef"] {
            assert_eq!(
                bad.parse::<MonthKey>(),
                Err(InvalidMonthKey(bad.to_string())),
                "{bad}"
            );
        }
    }

    #[test]
    fn serializes_as_string() {
        let json = serde_json::to_string(&MonthKey::new(2025, Month::January)).unwrap();
        assert_eq!(json, "\"2025-01\"");
    }
}
