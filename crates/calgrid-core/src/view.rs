use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dates::{add_days, add_months, add_years};

/// Calendar zoom level. Fixed for the lifetime of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewGranularity {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl ViewGranularity {
    pub fn all() -> [Self; 4] {
        [Self::Yearly, Self::Monthly, Self::Weekly, Self::Daily]
    }

    pub fn as_key(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
            Self::Yearly => "Yearly",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Some(Self::Daily),
            "weekly" | "week" => Some(Self::Weekly),
            "monthly" | "month" => Some(Self::Monthly),
            "yearly" | "year" => Some(Self::Yearly),
            _ => None,
        }
    }
}

impl fmt::Display for ViewGranularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}

impl FromStr for ViewGranularity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s).ok_or_else(|| {
            anyhow!("unknown view: {s} (expected daily, weekly, monthly or yearly)")
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Prev,
    Next,
}

impl Direction {
    pub fn step(self) -> i64 {
        match self {
            Self::Prev => -1,
            Self::Next => 1,
        }
    }
}

/// Anchor after one prev/next press in `view`.
pub fn next_anchor(view: ViewGranularity, date: NaiveDate, direction: Direction) -> NaiveDate {
    shift_anchor(view, date, direction.step())
}

pub fn shift_anchor(view: ViewGranularity, date: NaiveDate, steps: i64) -> NaiveDate {
    match view {
        ViewGranularity::Daily => add_days(date, steps),
        ViewGranularity::Weekly => add_days(date, steps.saturating_mul(7)),
        ViewGranularity::Monthly => add_months(date, steps),
        ViewGranularity::Yearly => add_years(date, steps),
    }
}
