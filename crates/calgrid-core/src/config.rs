use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::dates::WeekStart;
use crate::grid::{
  DEFAULT_HOUR_END,
  DEFAULT_HOUR_START,
  HourRange
};
use crate::title::TitleFormat;

pub const DEFAULT_ROUTE: &str =
  "/calendar/monthly";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      ("default.route", DEFAULT_ROUTE),
      ("week.start", "sunday"),
      ("week.show_hours", "off"),
      ("color", "on")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }
    map.insert(
      "week.hour_start".to_string(),
      DEFAULT_HOUR_START.to_string()
    );
    map.insert(
      "week.hour_end".to_string(),
      DEFAULT_HOUR_END.to_string()
    );

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    rc_override
  ))]
  pub fn load(
    rc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let rc =
      resolve_rc_path(rc_override)?;
    if let Some(path) = rc {
      info!(rc = %path.display(), "loading calendarrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no calendarrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    self
      .map
      .get(key)
      .map(|v| {
        parse_bool(v).ok_or_else(|| {
          anyhow!(
            "invalid boolean for \
             {key}: {v}"
          )
        })
      })
      .transpose()
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = rc_path(
      Path::new(""),
      &path.to_string_lossy()
    );
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;
    self
      .loaded_files
      .push(path.clone());
    let base_dir = path
      .parent()
      .unwrap_or_else(|| Path::new("."))
      .to_path_buf();

    for (idx, raw_line) in
      text.lines().enumerate()
    {
      let parsed = RcLine::parse(raw_line)
        .with_context(|| {
          format!(
            "{}:{}",
            path.display(),
            idx + 1
          )
        })?;
      match parsed {
        | None => {}
        | Some(RcLine::Set(key, value)) => {
          trace!(key, value, "loaded config key");
          self.map.insert(
            key.to_string(),
            value.to_string()
          );
        }
        | Some(RcLine::Include(target)) => {
          self.include(&base_dir, target)?;
        }
      }
    }

    Ok(())
  }

  /// Missing or already loaded includes
  /// are skipped with a warning.
  fn include(
    &mut self,
    base_dir: &Path,
    target: &str
  ) -> anyhow::Result<()> {
    let path = rc_path(base_dir, target);
    if self.loaded_files.contains(&path) {
      warn!(include = %path.display(), "include already loaded; skipping");
      return Ok(());
    }
    if !path.exists() {
      warn!(include = %path.display(), "include file does not exist; skipping");
      return Ok(());
    }
    debug!(include = %path.display(), "processing include");
    self.load_file(&path)
  }
}

/// One meaningful rc line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RcLine<'a> {
  Set(&'a str, &'a str),
  Include(&'a str)
}

impl<'a> RcLine<'a> {
  /// `None` for blank and comment-only
  /// lines.
  fn parse(
    raw: &'a str
  ) -> anyhow::Result<Option<Self>> {
    let line = raw
      .split_once('#')
      .map_or(raw, |(before, _)| before)
      .trim();
    if line.is_empty() {
      return Ok(None);
    }

    if let Some(target) =
      line.strip_prefix("include ")
    {
      let target = target.trim();
      if target.is_empty() {
        return Err(anyhow!(
          "include path cannot be empty"
        ));
      }
      return Ok(Some(Self::Include(
        target
      )));
    }

    let (key, value) = line
      .split_once('=')
      .ok_or_else(|| {
        anyhow!(
          "expected `key = value` or \
           `include <file>`: {raw}"
        )
      })?;
    Ok(Some(Self::Set(
      key.trim(),
      value.trim()
    )))
  }
}

/// `~/` expands to the home directory;
/// other relative paths hang off
/// `base_dir`.
fn rc_path(
  base_dir: &Path,
  raw: &str
) -> PathBuf {
  match raw
    .strip_prefix("~/")
    .zip(dirs::home_dir())
  {
    | Some((rest, home)) => home.join(rest),
    | None => base_dir.join(raw)
  }
}

/// Typed view over the rc keys the
/// calendar reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSettings {
  pub default_route: String,
  pub week_start:    WeekStart,
  pub hours:         HourRange,
  pub show_hours:    bool,
  pub color:         bool,
  pub timezone:      Option<String>,
  pub title:         TitleFormat
}

impl CalendarSettings {
  #[tracing::instrument(skip_all)]
  pub fn from_config(
    cfg: &Config
  ) -> anyhow::Result<Self> {
    let week_start = cfg
      .get("week.start")
      .map(|raw| raw.parse::<WeekStart>())
      .transpose()
      .context("config key week.start")?
      .unwrap_or_default();

    let hour_start = parse_hour(
      cfg,
      "week.hour_start",
      DEFAULT_HOUR_START
    )?;
    let hour_end = parse_hour(
      cfg,
      "week.hour_end",
      DEFAULT_HOUR_END
    )?;
    let hours =
      HourRange::new(hour_start, hour_end)
        .context(
          "config keys \
           week.hour_start/week.hour_end"
        )?;

    let show_hours = cfg
      .get_bool("week.show_hours")?
      .unwrap_or(false);
    let color =
      cfg.get_bool("color")?.unwrap_or(true);

    let timezone = cfg
      .get("timezone")
      .map(|raw| raw.trim().to_string())
      .filter(|raw| !raw.is_empty());

    let defaults = TitleFormat::default();
    let title = TitleFormat {
      daily:         cfg
        .get("title.daily")
        .unwrap_or(defaults.daily),
      week_day:      cfg
        .get("title.week")
        .unwrap_or(defaults.week_day),
      week_day_year: cfg
        .get("title.week_year")
        .unwrap_or(defaults.week_day_year),
      monthly:       cfg
        .get("title.monthly")
        .unwrap_or(defaults.monthly)
    };
    title.validate()?;

    let settings = Self {
      default_route: cfg
        .get("default.route")
        .unwrap_or_else(|| {
          DEFAULT_ROUTE.to_string()
        }),
      week_start,
      hours,
      show_hours,
      color,
      timezone,
      title
    };
    debug!(?settings, "resolved calendar settings");
    Ok(settings)
  }
}

fn parse_hour(
  cfg: &Config,
  key: &str,
  default: u32
) -> anyhow::Result<u32> {
  match cfg.get(key) {
    | Some(raw) => {
      raw.trim().parse::<u32>().with_context(
        || {
          format!(
            "invalid hour for {key}: \
             {raw}"
          )
        }
      )
    }
    | None => Ok(default)
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rc_env) =
    std::env::var("CALGRIDRC")
  {
    if rc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping \
       ~/.calgridrc"
    );
    return Ok(None);
  };
  let candidate =
    home.join(".calgridrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn parse_bool(s: &str) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use std::fs;

  use tempfile::tempdir;

  use super::*;

  #[test]
  fn defaults_resolve_to_settings() {
    let settings =
      CalendarSettings::from_config(
        &Config::default()
      )
      .expect("default settings");
    assert_eq!(
      settings.week_start,
      WeekStart::Sunday
    );
    assert_eq!(
      settings.hours,
      HourRange::default()
    );
    assert!(!settings.show_hours);
    assert!(settings.color);
    assert_eq!(
      settings.default_route,
      DEFAULT_ROUTE
    );
    assert_eq!(settings.timezone, None);
  }

  #[test]
  fn loads_file_with_include() {
    let temp =
      tempdir().expect("tempdir");
    let extra =
      temp.path().join("hours.rc");
    fs::write(
      &extra,
      "week.hour_start = 7\n\
       week.hour_end = 18 # evening\n"
    )
    .expect("write include");
    let rc =
      temp.path().join("calgridrc");
    fs::write(
      &rc,
      "# calendar\n\
       week.start = monday\n\
       include hours.rc\n\
       timezone = Europe/Berlin\n"
    )
    .expect("write rc");

    let cfg = Config::load(Some(rc.as_path()))
      .expect("load rc");
    assert_eq!(cfg.loaded_files.len(), 2);

    let settings =
      CalendarSettings::from_config(&cfg)
        .expect("settings");
    assert_eq!(
      settings.week_start,
      WeekStart::Monday
    );
    assert_eq!(settings.hours.start(), 7);
    assert_eq!(settings.hours.end(), 18);
    assert_eq!(
      settings.timezone.as_deref(),
      Some("Europe/Berlin")
    );
  }

  #[test]
  fn overrides_win_over_file() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![
      (
        "rc.week.show_hours".to_string(),
        "yes".to_string()
      ),
      (
        "color".to_string(),
        "off".to_string()
      ),
    ]);
    let settings =
      CalendarSettings::from_config(&cfg)
        .expect("settings");
    assert!(settings.show_hours);
    assert!(!settings.color);
  }

  #[test]
  fn rejects_bad_values() {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("bad.rc");
    fs::write(&rc, "not a pair\n")
      .expect("write rc");
    assert!(Config::load(Some(rc.as_path())).is_err());

    for (key, value) in [
      ("week.start", "friday"),
      ("week.hour_start", "21"),
      ("week.hour_end", "25"),
      ("week.show_hours", "maybe"),
      ("title.monthly", "%Q"),
      ("title.daily", "%H:%M")
    ] {
      let mut cfg = Config::default();
      cfg.apply_overrides(vec![(
        key.to_string(),
        value.to_string()
      )]);
      assert!(
        CalendarSettings::from_config(
          &cfg
        )
        .is_err(),
        "{key}={value} should be rejected"
      );
    }
  }

  #[test]
  fn parses_rc_lines() {
    assert_eq!(
      RcLine::parse("  # note")
        .expect("comment"),
      None
    );
    assert_eq!(
      RcLine::parse(
        "week.start = monday # first"
      )
      .expect("pair"),
      Some(RcLine::Set(
        "week.start",
        "monday"
      ))
    );
    assert_eq!(
      RcLine::parse("include ~/more.rc")
        .expect("include"),
      Some(RcLine::Include("~/more.rc"))
    );
    assert!(
      RcLine::parse("include  ").is_err()
    );
  }

  #[test]
  fn include_cycles_are_skipped() {
    let temp =
      tempdir().expect("tempdir");
    let rc = temp.path().join("a.rc");
    fs::write(
      &rc,
      "include b.rc\ncolor = off\n"
    )
    .expect("write a");
    fs::write(
      temp.path().join("b.rc"),
      "include a.rc\nweek.start = monday\n"
    )
    .expect("write b");

    let cfg = Config::load(Some(rc.as_path()))
      .expect("load rc");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.get("week.start").as_deref(),
      Some("monday")
    );
    assert_eq!(
      cfg.get("color").as_deref(),
      Some("off")
    );
  }
}
