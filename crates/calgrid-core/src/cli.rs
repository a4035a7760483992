use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use chrono::NaiveDate;
use clap::{ArgAction, Parser};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::CalendarSettings;
use crate::dates::WeekStart;
use crate::datetime::parse_date_expr;
use crate::grid::HourRange;
use crate::page::PageOptions;
use crate::route::{self, Route};
use crate::view::{ViewGranularity, shift_anchor};

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "calgrid",
    version,
    about = "Calendar grids in the terminal: daily, weekly, monthly and yearly views",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "calendarrc")]
    pub calendarrc: Option<PathBuf>,

    /// Route such as /calendar/weekly, or a bare view name.
    pub route: Option<String>,

    /// Anchor date expression (today, 2024-02-15, +2w, march, ...).
    #[arg(short = 'd', long = "date")]
    pub date: Option<String>,

    /// Move the anchor back N steps of the view.
    #[arg(long = "prev", value_name = "N", conflicts_with = "next")]
    pub prev: Option<u32>,

    /// Move the anchor forward N steps of the view.
    #[arg(long = "next", value_name = "N")]
    pub next: Option<u32>,

    #[arg(
        long = "week-start",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<WeekStart>())
    )]
    pub week_start: Option<WeekStart>,

    /// Show the hour-by-day matrix in the weekly view.
    #[arg(long = "hours")]
    pub hours: bool,

    #[arg(long = "hour-start", value_name = "H")]
    pub hour_start: Option<u32>,

    #[arg(long = "hour-end", value_name = "H")]
    pub hour_end: Option<u32>,

    #[arg(long = "json")]
    pub json: bool,

    /// Read navigation commands from stdin, one per line.
    #[arg(short = 'i', long = "interactive")]
    pub interactive: bool,

    /// Print the effective configuration and exit.
    #[arg(long = "show-config")]
    pub show_config: bool,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

/// What to show: the resolved route, its starting anchor and grid options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub route: Route,
    pub anchor: NaiveDate,
    pub options: PageOptions,
}

impl PageRequest {
    #[tracing::instrument(skip(cli, settings))]
    pub fn resolve(
        cli: &GlobalCli,
        settings: &CalendarSettings,
        today: NaiveDate,
    ) -> anyhow::Result<Self> {
        let raw_route = cli
            .route
            .clone()
            .unwrap_or_else(|| settings.default_route.clone());
        let route = route::resolve(&raw_route);
        debug!(raw = %raw_route, resolved = %route.path(), "resolved route");

        let mut anchor = match cli.date.as_deref() {
            Some(expr) => parse_date_expr(expr, today)
                .with_context(|| format!("invalid --date value: {expr}"))?,
            None => today,
        };

        let steps = match (cli.prev, cli.next) {
            (Some(n), _) => -i64::from(n),
            (None, Some(n)) => i64::from(n),
            (None, None) => 0,
        };
        if steps != 0 {
            let view = route.view().unwrap_or(ViewGranularity::Monthly);
            anchor = shift_anchor(view, anchor, steps);
        }

        let hours = HourRange::new(
            cli.hour_start.unwrap_or(settings.hours.start()),
            cli.hour_end.unwrap_or(settings.hours.end()),
        )
        .context("invalid --hour-start/--hour-end")?;

        Ok(Self {
            route,
            anchor,
            options: PageOptions {
                week_start: cli.week_start.unwrap_or(settings.week_start),
                show_hours: cli.hours || settings.show_hours,
                hours,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn settings() -> CalendarSettings {
        CalendarSettings::from_config(&Config::default()).expect("default settings")
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let raw = ["calgrid", "rc.week.start=monday", "weekly", "rc.color:off"]
            .into_iter()
            .map(OsString::from)
            .collect::<Vec<_>>();
        let pre = preprocess_args(&raw).expect("preprocess");
        assert_eq!(pre.cleaned_args, vec![OsString::from("calgrid"), OsString::from("weekly")]);
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.week.start".to_string(), "monday".to_string()),
                ("rc.color".to_string(), "off".to_string()),
            ]
        );
    }

    #[test]
    fn request_uses_defaults() {
        let cli = GlobalCli::parse_from(["calgrid"]);
        let today = ymd(2024, 2, 15);
        let request = PageRequest::resolve(&cli, &settings(), today).expect("request");
        assert_eq!(request.route, Route::Calendar(ViewGranularity::Monthly));
        assert_eq!(request.anchor, today);
        assert_eq!(request.options, PageOptions::default());
    }

    #[test]
    fn request_applies_flags() {
        let cli = GlobalCli::parse_from([
            "calgrid",
            "/calendar/weekly",
            "--date",
            "2024-02-15",
            "--prev",
            "2",
            "--week-start",
            "monday",
            "--hours",
            "--hour-start",
            "6",
        ]);
        let request = PageRequest::resolve(&cli, &settings(), ymd(2030, 1, 1)).expect("request");
        assert_eq!(request.route, Route::Calendar(ViewGranularity::Weekly));
        assert_eq!(request.anchor, ymd(2024, 2, 1));
        assert_eq!(request.options.week_start, WeekStart::Monday);
        assert!(request.options.show_hours);
        assert_eq!(request.options.hours.start(), 6);
        assert_eq!(request.options.hours.end(), 20);
    }

    #[test]
    fn request_rejects_bad_input() {
        let today = ymd(2024, 2, 15);
        let cli = GlobalCli::parse_from(["calgrid", "--date", "whenever"]);
        assert!(PageRequest::resolve(&cli, &settings(), today).is_err());

        let cli = GlobalCli::parse_from(["calgrid", "--hour-start", "22", "--hour-end", "3"]);
        assert!(PageRequest::resolve(&cli, &settings(), today).is_err());

        assert!(GlobalCli::try_parse_from(["calgrid", "--week-start", "friday"]).is_err());
        assert!(GlobalCli::try_parse_from(["calgrid", "--prev", "1", "--next", "1"]).is_err());
    }
}
