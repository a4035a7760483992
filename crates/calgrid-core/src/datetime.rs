use std::fmt;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Local,
  Month,
  NaiveDate,
  NaiveDateTime,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::dates::{
  add_days,
  add_months,
  add_years,
  first_day_of_month,
  start_of_day
};

const ZONE_FILE_NAME: &str =
  "calgrid-time.toml";
const ZONE_ENV_VAR: &str =
  "CALGRID_TIMEZONE";
const ZONE_FILE_ENV_VAR: &str =
  "CALGRID_TIME_CONFIG";

/// `timezone = "..."` at the top level
/// or under `[time]`.
#[derive(Debug, Default, Deserialize)]
struct ZoneFile {
  #[serde(default)]
  timezone: Option<String>,
  #[serde(default)]
  time:     Option<ZoneFileSection>
}

#[derive(Debug, Default, Deserialize)]
struct ZoneFileSection {
  #[serde(default)]
  timezone: Option<String>
}

/// Zone that decides which calendar day
/// "today" is.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq,
)]
pub enum CalendarZone {
  Local,
  Named(Tz)
}

impl CalendarZone {
  #[must_use]
  pub fn today_at(
    self,
    now: DateTime<Utc>
  ) -> NaiveDate {
    let local = match self {
      | Self::Local => {
        now
          .with_timezone(&Local)
          .naive_local()
      }
      | Self::Named(tz) => {
        now
          .with_timezone(&tz)
          .naive_local()
      }
    };
    start_of_day(local).date()
  }

  #[must_use]
  pub fn today(self) -> NaiveDate {
    self.today_at(Utc::now())
  }
}

/// One place a zone name may come from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ZoneSource {
  Rc(String),
  Env(String),
  File(PathBuf)
}

impl fmt::Display for ZoneSource {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    match self {
      | Self::Rc(_) => f.write_str("rc"),
      | Self::Env(_) => {
        f.write_str(ZONE_ENV_VAR)
      }
      | Self::File(path) => {
        write!(f, "{}", path.display())
      }
    }
  }
}

impl ZoneSource {
  /// Lookup order: rc value,
  /// `CALGRID_TIMEZONE`, then the zone
  /// file.
  fn chain(
    configured: Option<&str>
  ) -> Vec<Self> {
    let mut chain = Vec::with_capacity(3);
    if let Some(raw) = configured {
      chain.push(Self::Rc(raw.to_string()));
    }
    if let Ok(raw) =
      std::env::var(ZONE_ENV_VAR)
    {
      chain.push(Self::Env(raw));
    }
    if let Some(path) = zone_file_path() {
      chain.push(Self::File(path));
    }
    chain
  }

  /// `Ok(None)` when the source names
  /// no zone at all.
  fn zone(
    &self
  ) -> anyhow::Result<Option<Tz>> {
    let name = match self {
      | Self::Rc(raw) | Self::Env(raw) => {
        Some(raw.clone())
      }
      | Self::File(path) => {
        read_zone_file(path)?
      }
    };

    let Some(name) = name
      .map(|raw| raw.trim().to_string())
      .filter(|raw| !raw.is_empty())
    else {
      return Ok(None);
    };

    name
      .parse::<Tz>()
      .map(Some)
      .map_err(|err| {
        anyhow!(
          "unknown timezone {name}: {err}"
        )
      })
  }
}

#[tracing::instrument]
pub fn resolve_zone(
  configured: Option<&str>
) -> CalendarZone {
  for source in
    ZoneSource::chain(configured)
  {
    match source.zone() {
      | Ok(Some(tz)) => {
        info!(%source, timezone = %tz, "calendar timezone");
        return CalendarZone::Named(tz);
      }
      | Ok(None) => {
        trace!(%source, "no timezone here");
      }
      | Err(err) => {
        warn!(%source, error = %format!("{err:#}"), "ignoring timezone source");
      }
    }
  }

  debug!(
    "no timezone configured; using \
     system local zone"
  );
  CalendarZone::Local
}

fn zone_file_path() -> Option<PathBuf> {
  std::env::var(ZONE_FILE_ENV_VAR)
    .ok()
    .map(|raw| raw.trim().to_string())
    .filter(|raw| !raw.is_empty())
    .map(PathBuf::from)
    .or_else(|| {
      std::env::current_dir()
        .ok()
        .map(|dir| dir.join(ZONE_FILE_NAME))
    })
}

fn read_zone_file(
  path: &Path
) -> anyhow::Result<Option<String>> {
  if !path.exists() {
    return Ok(None);
  }
  let raw = fs::read_to_string(path)
    .with_context(|| {
      format!(
        "failed to read {}",
        path.display()
      )
    })?;
  let file: ZoneFile =
    toml::from_str(&raw).with_context(
      || {
        format!(
          "failed to parse {}",
          path.display()
        )
      }
    )?;
  Ok(file.timezone.or_else(|| {
    file
      .time
      .and_then(|section| section.timezone)
  }))
}

/// Resolves a user-typed date relative to
/// `today`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  if let Some(date) =
    named_date(&lower, today)
  {
    return Ok(date);
  }
  if let Some(date) =
    offset_date(&lower, today)?
  {
    return Ok(date);
  }
  if let Some(date) =
    calendar_month(token)?
  {
    return Ok(date);
  }
  if let Some(date) = absolute_date(token)
  {
    return Ok(date);
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday, 4-digit \
     year, weekday names (e.g. \
     monday), month names (e.g. \
     march), +Nd/-Nw/+Nm/-Ny, \
     YYYY-MM-DD, YYYY-MM, \
     YYYY-MM-DDTHH:MM, RFC3339"
  })
}

/// Keywords, weekday names (next
/// occurrence after today) and month
/// names (next 1st of that month).
fn named_date(
  lower: &str,
  today: NaiveDate
) -> Option<NaiveDate> {
  match lower {
    | "now" | "today" => return Some(today),
    | "tomorrow" => {
      return Some(add_days(today, 1));
    }
    | "yesterday" => {
      return Some(add_days(today, -1));
    }
    | _ => {}
  }

  if let Ok(weekday) =
    lower.parse::<Weekday>()
  {
    return (1..=7)
      .map(|n| add_days(today, n))
      .find(|day| day.weekday() == weekday);
  }

  let month = lower
    .parse::<Month>()
    .ok()?
    .number_from_month();
  let this_year =
    first_day_of_month(today.year(), month);
  if this_year > today {
    Some(this_year)
  } else {
    Some(first_day_of_month(
      today.year().saturating_add(1),
      month
    ))
  }
}

/// `+3d`, `-2w`, `+1m`, `-1y`. Shifts past
/// the representable range keep `today`.
fn offset_date(
  lower: &str,
  today: NaiveDate
) -> anyhow::Result<Option<NaiveDate>> {
  let re = Regex::new(
    r"^([+-])(\d+)([dwmy])$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile failure: \
       {e}"
    )
  })?;
  let Some(caps) = re.captures(lower)
  else {
    return Ok(None);
  };

  let magnitude: i64 = caps[2]
    .parse()
    .with_context(|| {
      format!(
        "relative amount out of range: \
         {}",
        &caps[2]
      )
    })?;
  let amount = if &caps[1] == "-" {
    -magnitude
  } else {
    magnitude
  };

  let date = match &caps[3] {
    | "d" => add_days(today, amount),
    | "w" => {
      amount
        .checked_mul(7)
        .map_or(today, |days| {
          add_days(today, days)
        })
    }
    | "m" => add_months(today, amount),
    | _ => add_years(today, amount)
  };
  Ok(Some(date))
}

/// `YYYY` or `YYYY-MM`, both meaning the
/// 1st of that month.
fn calendar_month(
  token: &str
) -> anyhow::Result<Option<NaiveDate>> {
  let re = Regex::new(
    r"^(\d{4})(?:-(\d{1,2}))?$"
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile failure: \
       {e}"
    )
  })?;
  let Some(caps) = re.captures(token)
  else {
    return Ok(None);
  };

  let year: i32 = caps[1]
    .parse()
    .context("invalid year")?;
  let month: u32 = match caps.get(2) {
    | Some(raw) => {
      raw
        .as_str()
        .parse()
        .context("invalid month")?
    }
    | None => 1
  };
  NaiveDate::from_ymd_opt(year, month, 1)
    .map(Some)
    .ok_or_else(|| {
      anyhow!(
        "invalid year/month: {token}"
      )
    })
}

fn absolute_date(
  token: &str
) -> Option<NaiveDate> {
  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Some(date);
  }

  ["%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
    .into_iter()
    .find_map(|fmt| {
      NaiveDateTime::parse_from_str(
        token, fmt
      )
      .ok()
    })
    .or_else(|| {
      DateTime::parse_from_rfc3339(token)
        .ok()
        .map(|dt| dt.naive_local())
    })
    .map(|ndt| start_of_day(ndt).date())
}
