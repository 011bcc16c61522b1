//! Historical dates with partial precision.
//!
//! Humanities data rarely has full dates: "1850", "March 1850", "12 March
//! 1850" and "500 BCE" all occur, and so does a bare "March". An `HDate`
//! records only the calendar fields that were actually given, and two dates
//! compare on the fields they share. A year-only date and a month-only date
//! share nothing and are incomparable.

use std::cmp::Ordering;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HDate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
}

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

static ERA_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*\b(b\.?\s?c\.?(\s?e\.?)?|c\.?\s?e\.?|a\.?\s?d\.?)$").unwrap()
});
static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\d{1,4})(?:[-/](\d{1,2})(?:[-/](\d{1,2}))?)?$").unwrap()
});
static MONTH_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z]+)\.?(?:\s+(\d{1,4}))?(?:,?\s+(\d{1,4}))?$").unwrap()
});
static DAY_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2})\s+([A-Za-z]+)\.?,?\s+(\d{1,4})$").unwrap()
});

fn month_from_name(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    if name.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|m| m.starts_with(&name))
        .map(|i| i as u32 + 1)
}

impl HDate {
    pub fn year(year: i32) -> Self {
        Self { year: Some(year), ..Default::default() }
    }

    pub fn ymd(year: i32, month: u32, day: u32) -> Self {
        Self { year: Some(year), month: Some(month), day: Some(day) }
    }

    pub fn is_empty(&self) -> bool {
        self.year.is_none() && self.month.is_none() && self.day.is_none()
    }

    /// Parse a free-text date. Returns None for text that is not a date or
    /// names an impossible one (e.g. February 30th).
    pub fn parse(input: &str) -> Option<Self> {
        let mut text = input.trim().to_string();
        if text.is_empty() {
            return None;
        }

        // Era suffix: BCE/BC negate the year, CE/AD are noise
        let mut bce = false;
        if let Some(m) = ERA_SUFFIX.find(&text) {
            bce = m.as_str().trim().to_lowercase().starts_with('b');
            text.truncate(m.start());
            text = text.trim().to_string();
        }

        let date = Self::parse_plain(&text)?;
        let date = if bce {
            // An era only makes sense attached to a year
            let year = date.year?;
            Self { year: Some(-year.abs()), ..date }
        } else {
            date
        };
        date.validated()
    }

    fn parse_plain(text: &str) -> Option<Self> {
        if let Some(caps) = NUMERIC.captures(text) {
            return Some(Self {
                year: caps.get(1).and_then(|m| m.as_str().parse().ok()),
                month: caps.get(2).and_then(|m| m.as_str().parse().ok()),
                day: caps.get(3).and_then(|m| m.as_str().parse().ok()),
            });
        }

        if let Some(caps) = DAY_FIRST.captures(text) {
            return Some(Self {
                year: caps[3].parse().ok(),
                month: Some(month_from_name(&caps[2])?),
                day: caps[1].parse().ok(),
            });
        }

        if let Some(caps) = MONTH_FIRST.captures(text) {
            let month = month_from_name(&caps[1])?;
            let first = caps.get(2).map(|m| m.as_str());
            let second = caps.get(3).map(|m| m.as_str());
            return match (first, second) {
                (None, _) => Some(Self { month: Some(month), ..Default::default() }),
                // "March 12, 1850"
                (Some(d), Some(y)) => Some(Self {
                    year: y.parse().ok(),
                    month: Some(month),
                    day: d.parse().ok(),
                }),
                // "March 1850" vs "March 12": short numbers are days
                (Some(n), None) if n.len() <= 2 => Some(Self {
                    month: Some(month),
                    day: n.parse().ok(),
                    ..Default::default()
                }),
                (Some(y), None) => Some(Self {
                    year: y.parse().ok(),
                    month: Some(month),
                    ..Default::default()
                }),
            };
        }

        None
    }

    fn validated(self) -> Option<Self> {
        if let Some(month) = self.month {
            if !(1..=12).contains(&month) {
                return None;
            }
        }
        if let Some(day) = self.day {
            // Check against a leap year when the year is unknown so Feb 29 survives
            let year = self.year.unwrap_or(2000);
            let month = self.month.unwrap_or(1);
            NaiveDate::from_ymd_opt(year, month, day)?;
        }
        Some(self)
    }

    /// Read a date out of a record attribute. Accepts plain strings, bare
    /// year numbers, and objects carrying either `year/month/day` fields or a
    /// `formattedDateString`/`effectiveDate` string.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()).map(Self::year),
            Value::Object(map) => {
                let field = |k: &str| map.get(k).and_then(Value::as_i64);
                let date = Self {
                    year: field("year").and_then(|v| i32::try_from(v).ok()),
                    month: field("month").and_then(|v| u32::try_from(v).ok()),
                    day: field("day").and_then(|v| u32::try_from(v).ok()),
                };
                if !date.is_empty() {
                    return date.validated();
                }
                ["formattedDateString", "effectiveDate"]
                    .iter()
                    .find_map(|k| map.get(*k).and_then(Value::as_str))
                    .and_then(Self::parse)
            }
            _ => None,
        }
    }

    /// Compare on the calendar fields both dates carry, most significant
    /// first. None when the dates share no field.
    pub fn compare(&self, other: &HDate) -> Option<Ordering> {
        let pairs = [
            (self.year.map(i64::from), other.year.map(i64::from)),
            (self.month.map(i64::from), other.month.map(i64::from)),
            (self.day.map(i64::from), other.day.map(i64::from)),
        ];
        let mut shared = false;
        for (a, b) in pairs {
            if let (Some(a), Some(b)) = (a, b) {
                shared = true;
                match a.cmp(&b) {
                    Ordering::Equal => continue,
                    ord => return Some(ord),
                }
            }
        }
        shared.then_some(Ordering::Equal)
    }
}
