//! Calendar-date helpers shared by the
//! grids, the header and navigation.
//!
//! Every helper returns a new value and
//! none of them fail: a shift that would
//! leave chrono's representable range
//! yields the input unchanged.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  Datelike,
  Duration,
  NaiveDate,
  NaiveDateTime,
  Weekday
};
use serde::{
  Deserialize,
  Serialize
};

/// Which day opens a week row.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize
)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
  #[default]
  Sunday,
  Monday
}

impl WeekStart {
  #[must_use]
  pub fn from_monday_first(
    monday_first: bool
  ) -> Self {
    if monday_first {
      Self::Monday
    } else {
      Self::Sunday
    }
  }

  #[must_use]
  pub fn as_weekday(self) -> Weekday {
    match self {
      | Self::Sunday => Weekday::Sun,
      | Self::Monday => Weekday::Mon
    }
  }

  #[must_use]
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Sunday => "sunday",
      | Self::Monday => "monday"
    }
  }

  #[must_use]
  pub fn weekday_labels(
    self
  ) -> [&'static str; 7] {
    match self {
      | Self::Sunday => {
        [
          "Sun", "Mon", "Tue", "Wed",
          "Thu", "Fri", "Sat"
        ]
      }
      | Self::Monday => {
        [
          "Mon", "Tue", "Wed", "Thu",
          "Fri", "Sat", "Sun"
        ]
      }
    }
  }
}

impl fmt::Display for WeekStart {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_key())
  }
}

impl FromStr for WeekStart {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "sunday" | "sun" => {
        Ok(Self::Sunday)
      }
      | "monday" | "mon" => {
        Ok(Self::Monday)
      }
      | other => {
        Err(anyhow!(
          "invalid week start: \
           {other} (expected sunday \
           or monday)"
        ))
      }
    }
  }
}

#[must_use]
pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  Duration::try_days(days)
    .and_then(|delta| {
      date.checked_add_signed(delta)
    })
    .unwrap_or(date)
}

/// Shifts by whole months, clamping the
/// day to the target month's length.
#[must_use]
pub fn add_months(
  date: NaiveDate,
  months: i64
) -> NaiveDate {
  let Some(total) =
    i64::from(date.year())
      .checked_mul(12)
      .and_then(|base| {
        base.checked_add(i64::from(
          date.month0()
        ))
      })
      .and_then(|base| {
        base.checked_add(months)
      })
  else {
    return date;
  };
  let Ok(year) =
    i32::try_from(total.div_euclid(12))
  else {
    return date;
  };
  let month =
    total.rem_euclid(12) as u32 + 1;
  let day = date
    .day()
    .min(days_in_month(year, month));
  NaiveDate::from_ymd_opt(
    year, month, day
  )
  .unwrap_or(date)
}

#[must_use]
pub fn add_years(
  date: NaiveDate,
  years: i64
) -> NaiveDate {
  years
    .checked_mul(12)
    .map_or(date, |months| {
      add_months(date, months)
    })
}

#[must_use]
pub fn start_of_day(
  dt: NaiveDateTime
) -> NaiveDateTime {
  dt.date()
    .and_hms_opt(0, 0, 0)
    .unwrap_or(dt)
}

/// Nearest `week_start` day at or before
/// `day`.
#[must_use]
pub fn start_of_week(
  day: NaiveDate,
  week_start: WeekStart
) -> NaiveDate {
  let from_sunday = i64::from(
    day
      .weekday()
      .num_days_from_sunday()
  );
  let offset = match week_start {
    | WeekStart::Sunday => from_sunday,
    | WeekStart::Monday => {
      (from_sunday + 6) % 7
    }
  };
  add_days(day, -offset)
}

#[must_use]
pub fn first_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  NaiveDate::from_ymd_opt(
    year, month, 1
  )
  .unwrap_or(NaiveDate::MIN)
}

#[must_use]
pub fn last_day_of_month(
  year: i32,
  month: u32
) -> NaiveDate {
  let (next_year, next_month) =
    if month >= 12 {
      (year.saturating_add(1), 1_u32)
    } else {
      (year, month + 1)
    };
  NaiveDate::from_ymd_opt(
    next_year, next_month, 1
  )
  .and_then(|first| first.pred_opt())
  .unwrap_or(NaiveDate::MAX)
}

#[must_use]
pub fn days_in_month(
  year: i32,
  month: u32
) -> u32 {
  last_day_of_month(year, month).day()
}
