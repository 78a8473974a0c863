//! Core data types shared across the pipeline.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A single raw price observation as read from the input table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub symbol: String,
    pub date: String,
    pub open: f64,
    pub close: f64,
}

impl RawObservation {
    /// Create a new observation.
    pub fn new(symbol: impl Into<String>, date: impl Into<String>, open: f64, close: f64) -> Self {
        Self {
            symbol: symbol.into(),
            date: date.into(),
            open,
            close,
        }
    }

    /// Basic row validation: non-empty symbol and date, finite prices.
    pub fn validate(&self) -> bool {
        !self.symbol.trim().is_empty()
            && !self.date.trim().is_empty()
            && self.open.is_finite()
            && self.close.is_finite()
    }
}

/// A position on the global date axis.
///
/// Parsed dates order chronologically and always precede unparseable ones,
/// which keep their original text and order lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DateKey {
    Parsed(NaiveDateTime),
    Unparsed(String),
}

impl DateKey {
    /// Whether this date was recognised chronologically.
    pub fn is_parsed(&self) -> bool {
        matches!(self, DateKey::Parsed(_))
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateKey::Parsed(dt) if dt.time().num_seconds_from_midnight() == 0 => {
                write!(f, "{}", dt.format("%Y-%m-%d"))
            }
            DateKey::Parsed(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            DateKey::Unparsed(raw) => write!(f, "{}", raw),
        }
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Open and close of one symbol on one date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub open: f64,
    pub close: f64,
}

impl PricePoint {
    pub fn new(open: f64, close: f64) -> Self {
        Self { open, close }
    }

    /// Value of the requested field.
    pub fn get(&self, field: PriceField) -> f64 {
        match field {
            PriceField::Open => self.open,
            PriceField::Close => self.close,
        }
    }
}

/// Price field selector used by normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceField {
    Open,
    Close,
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceField::Open => write!(f, "open"),
            PriceField::Close => write!(f, "close"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> DateKey {
        DateKey::Parsed(
            NaiveDate::from_ymd_opt(y, m, d)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        )
    }

    #[test]
    fn test_date_key_ordering() {
        let mut keys = vec![
            DateKey::Unparsed("zzz".to_string()),
            day(2024, 2, 1),
            DateKey::Unparsed("aaa".to_string()),
            day(2023, 12, 31),
        ];
        keys.sort();
        assert_eq!(keys[0], day(2023, 12, 31));
        assert_eq!(keys[1], day(2024, 2, 1));
        assert_eq!(keys[2], DateKey::Unparsed("aaa".to_string()));
        assert_eq!(keys[3], DateKey::Unparsed("zzz".to_string()));
    }

    #[test]
    fn test_date_key_display() {
        assert_eq!(day(2024, 1, 5).to_string(), "2024-01-05");
        assert_eq!(DateKey::Unparsed("Q1".into()).to_string(), "Q1");
    }

    #[test]
    fn test_observation_validate() {
        assert!(RawObservation::new("AAPL", "2024-01-01", 1.0, 2.0).validate());
        assert!(!RawObservation::new(" ", "2024-01-01", 1.0, 2.0).validate());
        assert!(!RawObservation::new("AAPL", "", 1.0, 2.0).validate());
        assert!(!RawObservation::new("AAPL", "2024-01-01", f64::NAN, 2.0).validate());
    }
}
