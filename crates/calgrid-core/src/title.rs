use std::fmt::Write as _;

use anyhow::anyhow;
use chrono::format::{Item, StrftimeItems};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::warn;

use crate::dates::{WeekStart, add_days, start_of_week};
use crate::view::ViewGranularity;

/// strftime patterns used for header titles. Defaults read the way an
/// `en-US` browser prints dates; override them through the rc file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TitleFormat {
    pub daily: String,
    pub week_day: String,
    pub week_day_year: String,
    pub monthly: String,
}

impl Default for TitleFormat {
    fn default() -> Self {
        Self {
            daily: "%A, %B %-d, %Y".to_string(),
            week_day: "%b %-d".to_string(),
            week_day_year: "%b %-d, %Y".to_string(),
            monthly: "%B %Y".to_string(),
        }
    }
}

impl TitleFormat {
    /// Rejects patterns chrono cannot parse, and patterns that need a time
    /// of day or an offset a plain date does not have.
    pub fn validate(&self) -> anyhow::Result<()> {
        let sample = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap_or_default();
        for (key, pattern) in self.patterns() {
            if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
                return Err(anyhow!("invalid date pattern for {key}: {pattern}"));
            }
            if render(sample, pattern).is_none() {
                return Err(anyhow!("date pattern for {key} needs more than a date: {pattern}"));
            }
        }
        Ok(())
    }

    fn patterns(&self) -> [(&'static str, &str); 4] {
        [
            ("title.daily", self.daily.as_str()),
            ("title.week", self.week_day.as_str()),
            ("title.week_year", self.week_day_year.as_str()),
            ("title.monthly", self.monthly.as_str()),
        ]
    }
}

/// `None` when the pattern cannot be rendered for a date.
fn render(date: NaiveDate, pattern: &str) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", date.format(pattern)).ok()?;
    Some(out)
}

/// Renders with `pattern`, or with `fallback` when a pattern slipped past
/// validation.
fn render_or(date: NaiveDate, pattern: &str, fallback: &str) -> String {
    render(date, pattern)
        .or_else(|| {
            warn!(pattern, "title pattern failed; using default");
            render(date, fallback)
        })
        .unwrap_or_else(|| date.to_string())
}

#[tracing::instrument(level = "trace", skip(format))]
pub fn format_header_title(view: ViewGranularity, date: NaiveDate, format: &TitleFormat) -> String {
    let defaults = TitleFormat::default();
    match view {
        ViewGranularity::Daily => render_or(date, &format.daily, &defaults.daily),
        ViewGranularity::Weekly => format_week_range(date, format, &defaults),
        ViewGranularity::Monthly => render_or(date, &format.monthly, &defaults.monthly),
        ViewGranularity::Yearly => date.year().to_string(),
    }
}

// The header week is always Sunday-first, whatever the grid uses.
fn format_week_range(date: NaiveDate, format: &TitleFormat, defaults: &TitleFormat) -> String {
    let start = start_of_week(date, WeekStart::Sunday);
    let end = add_days(start, 6);

    let (start_pattern, start_default) = if start.year() == end.year() {
        (&format.week_day, &defaults.week_day)
    } else {
        (&format.week_day_year, &defaults.week_day_year)
    };

    format!(
        "{} – {}",
        render_or(start, start_pattern, start_default),
        render_or(end, &format.week_day_year, &defaults.week_day_year)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn title(view: ViewGranularity, date: NaiveDate) -> String {
        format_header_title(view, date, &TitleFormat::default())
    }

    #[test]
    fn daily_title_is_full_date() {
        assert_eq!(
            title(ViewGranularity::Daily, ymd(2024, 2, 15)),
            "Thursday, February 15, 2024"
        );
    }

    #[test]
    fn weekly_title_within_one_year() {
        assert_eq!(
            title(ViewGranularity::Weekly, ymd(2024, 2, 15)),
            "Feb 11 – Feb 17, 2024"
        );
    }

    #[test]
    fn weekly_title_crossing_new_year_shows_both_years() {
        assert_eq!(
            title(ViewGranularity::Weekly, ymd(2025, 1, 2)),
            "Dec 29, 2024 – Jan 4, 2025"
        );
        assert_eq!(
            title(ViewGranularity::Weekly, ymd(2024, 12, 31)),
            "Dec 29, 2024 – Jan 4, 2025"
        );
    }

    #[test]
    fn weekly_title_ignores_grid_week_start() {
        // Sunday 2024-02-18 opens its own header week.
        assert_eq!(
            title(ViewGranularity::Weekly, ymd(2024, 2, 18)),
            "Feb 18 – Feb 24, 2024"
        );
    }

    #[test]
    fn monthly_and_yearly_titles() {
        assert_eq!(title(ViewGranularity::Monthly, ymd(2024, 2, 15)), "February 2024");
        assert_eq!(title(ViewGranularity::Yearly, ymd(2024, 2, 15)), "2024");
    }

    #[test]
    fn custom_patterns_are_used_and_validated() {
        let format = TitleFormat {
            monthly: "%m/%Y".to_string(),
            ..TitleFormat::default()
        };
        assert!(format.validate().is_ok());
        assert_eq!(
            format_header_title(ViewGranularity::Monthly, ymd(2024, 2, 15), &format),
            "02/2024"
        );

        let broken = TitleFormat {
            daily: "%Q".to_string(),
            ..TitleFormat::default()
        };
        assert!(broken.validate().is_err());
    }

    #[test]
    fn time_fields_are_rejected_and_never_panic() {
        for pattern in ["%H:%M", "%z"] {
            let format = TitleFormat {
                daily: pattern.to_string(),
                week_day: pattern.to_string(),
                ..TitleFormat::default()
            };
            let err = format.validate().expect_err("time pattern should fail");
            assert!(format!("{err:#}").contains("title.daily"), "{pattern}");

            assert_eq!(
                format_header_title(ViewGranularity::Daily, ymd(2024, 2, 15), &format),
                "Thursday, February 15, 2024"
            );
            assert_eq!(
                format_header_title(ViewGranularity::Weekly, ymd(2024, 2, 15), &format),
                "Feb 11 – Feb 17, 2024"
            );
        }
    }
}
