//! Grid layouts for the four calendar views.
//!
//! Builders take `today` explicitly so a grid is a pure function of its
//! inputs; callers resolve the current date through
//! [`crate::datetime::today`].

use anyhow::anyhow;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::dates::{WeekStart, add_days, first_day_of_month, start_of_week};

pub const MONTH_GRID_CELLS: usize = 42;
pub const WEEK_DAYS: usize = 7;

pub const DEFAULT_HOUR_START: u32 = 9;
pub const DEFAULT_HOUR_END: u32 = 20;

/// Per-cell content injected by the caller. The default shows nothing.
pub trait CellContent {
    fn content(&self, _day: NaiveDate, _hour: Option<u32>) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoContent;

impl CellContent for NoContent {}

/// Adapts a closure into [`CellContent`].
pub struct FnContent<F>(pub F);

impl<F> CellContent for FnContent<F>
where
    F: Fn(NaiveDate, Option<u32>) -> Option<String>,
{
    fn content(&self, day: NaiveDate, hour: Option<u32>) -> Option<String> {
        (self.0)(day, hour)
    }
}

/// What a click on a grid cell surfaces to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CellTarget {
    pub day: NaiveDate,
    pub hour: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridCell {
    pub date: NaiveDate,
    pub outside: bool,
    pub today: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthGrid {
    pub anchor: NaiveDate,
    pub week_start: WeekStart,
    pub cells: Vec<GridCell>,
}

impl MonthGrid {
    #[tracing::instrument(level = "debug", skip(today))]
    pub fn build(anchor: NaiveDate, week_start: WeekStart, today: NaiveDate) -> Self {
        let first = first_day_of_month(anchor.year(), anchor.month());
        let grid_start = start_of_week(first, week_start);

        let cells = (0..MONTH_GRID_CELLS as i64)
            .map(|offset| {
                let date = add_days(grid_start, offset);
                GridCell {
                    date,
                    outside: date.month() != anchor.month() || date.year() != anchor.year(),
                    today: date == today,
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            first = %grid_start,
            last = %add_days(grid_start, MONTH_GRID_CELLS as i64 - 1),
            "month grid built"
        );

        Self {
            anchor,
            week_start,
            cells,
        }
    }

    pub fn weekday_labels(&self) -> [&'static str; 7] {
        self.week_start.weekday_labels()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[GridCell]> {
        self.cells.chunks(WEEK_DAYS)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&GridCell> {
        if col >= WEEK_DAYS {
            return None;
        }
        self.cells.get(row * WEEK_DAYS + col)
    }

    pub fn click(&self, row: usize, col: usize) -> Option<CellTarget> {
        self.cell(row, col).map(|cell| CellTarget {
            day: cell.date,
            hour: None,
        })
    }

    /// Today cells that belong to the displayed month.
    pub fn today_in_month(&self) -> usize {
        self.cells
            .iter()
            .filter(|cell| cell.today && !cell.outside)
            .count()
    }
}

/// Inclusive hour span for the hourly week and day views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourRange {
    start: u32,
    end: u32,
}

impl Default for HourRange {
    fn default() -> Self {
        Self {
            start: DEFAULT_HOUR_START,
            end: DEFAULT_HOUR_END,
        }
    }
}

impl HourRange {
    pub fn new(start: u32, end: u32) -> anyhow::Result<Self> {
        if start > 23 || end > 23 {
            return Err(anyhow!("hour range {start}..={end} must stay within 0..=23"));
        }
        if start > end {
            return Err(anyhow!("hour range start {start} is after end {end}"));
        }
        Ok(Self { start, end })
    }

    pub fn start(self) -> u32 {
        self.start
    }

    pub fn end(self) -> u32 {
        self.end
    }

    pub fn len(self) -> usize {
        (self.end - self.start + 1) as usize
    }

    pub fn contains(self, hour: u32) -> bool {
        (self.start..=self.end).contains(&hour)
    }

    pub fn hours(self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }
}

/// 12-hour label, e.g. `12 AM`, `9 AM`, `1 PM`.
pub fn format_hour_label(hour: u32) -> String {
    let hour12 = if hour % 12 == 0 { 12 } else { hour % 12 };
    let meridiem = if hour < 12 { "AM" } else { "PM" };
    format!("{hour12} {meridiem}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayColumn {
    pub date: NaiveDate,
    pub today: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourCell {
    pub day: NaiveDate,
    pub hour: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourRow {
    pub hour: u32,
    pub label: String,
    pub cells: Vec<HourCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekGrid {
    pub anchor: NaiveDate,
    pub week_start: WeekStart,
    pub days: Vec<DayColumn>,
    pub hours: Option<HourRange>,
    pub hour_rows: Vec<HourRow>,
}

impl WeekGrid {
    #[tracing::instrument(level = "debug", skip(today))]
    pub fn build(
        anchor: NaiveDate,
        week_start: WeekStart,
        hours: Option<HourRange>,
        today: NaiveDate,
    ) -> Self {
        let start = start_of_week(anchor, week_start);
        let days = (0..WEEK_DAYS as i64)
            .map(|offset| {
                let date = add_days(start, offset);
                DayColumn {
                    date,
                    today: date == today,
                }
            })
            .collect::<Vec<_>>();

        let hour_rows = hours
            .map(|range| {
                range
                    .hours()
                    .map(|hour| HourRow {
                        hour,
                        label: format_hour_label(hour),
                        cells: days
                            .iter()
                            .map(|column| HourCell {
                                day: column.date,
                                hour,
                            })
                            .collect(),
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Self {
            anchor,
            week_start,
            days,
            hours,
            hour_rows,
        }
    }

    pub fn is_hourly(&self) -> bool {
        self.hours.is_some()
    }

    pub fn weekday_labels(&self) -> [&'static str; 7] {
        self.week_start.weekday_labels()
    }

    /// Clickable regions: one per day, or one per day and hour.
    pub fn cell_count(&self) -> usize {
        if self.is_hourly() {
            self.hour_rows.iter().map(|row| row.cells.len()).sum()
        } else {
            self.days.len()
        }
    }

    /// Hourly grids need an hour inside their range; plain grids take none.
    pub fn click(&self, col: usize, hour: Option<u32>) -> Option<CellTarget> {
        let column = self.days.get(col)?;
        match (self.hours, hour) {
            (Some(range), Some(h)) if range.contains(h) => Some(CellTarget {
                day: column.date,
                hour: Some(h),
            }),
            (None, None) => Some(CellTarget {
                day: column.date,
                hour: None,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourSlot {
    pub hour: u32,
    pub label: String,
}

/// Hour slots for a single day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayHours {
    pub date: NaiveDate,
    pub today: bool,
    pub slots: Vec<HourSlot>,
}

impl DayHours {
    pub fn build(anchor: NaiveDate, range: HourRange, today: NaiveDate) -> Self {
        Self {
            date: anchor,
            today: anchor == today,
            slots: range
                .hours()
                .map(|hour| HourSlot {
                    hour,
                    label: format_hour_label(hour),
                })
                .collect(),
        }
    }

    pub fn click(&self, row: usize) -> Option<CellTarget> {
        self.slots.get(row).map(|slot| CellTarget {
            day: self.date,
            hour: Some(slot.hour),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearGrid {
    pub year: i32,
    pub months: Vec<MonthGrid>,
}

impl YearGrid {
    pub fn build(anchor: NaiveDate, week_start: WeekStart, today: NaiveDate) -> Self {
        let year = anchor.year();
        let months = (1..=12)
            .map(|month| MonthGrid::build(first_day_of_month(year, month), week_start, today))
            .collect();
        Self { year, months }
    }

    /// `index` counts months from zero; `row`/`col` address that month's grid.
    pub fn click(&self, index: usize, row: usize, col: usize) -> Option<CellTarget> {
        self.months.get(index)?.click(row, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn month_grid_spans_lead_and_trail_days() {
        let grid = MonthGrid::build(ymd(2024, 2, 15), WeekStart::Sunday, ymd(2024, 2, 15));
        assert_eq!(grid.cells.len(), MONTH_GRID_CELLS);
        assert_eq!(grid.cells[0].date, ymd(2024, 1, 28));
        assert_eq!(grid.cells[41].date, ymd(2024, 3, 9));
        assert!(grid.cells[0].outside);
        assert!(!grid.cells[4].outside);
        assert_eq!(grid.cells[4].date, ymd(2024, 2, 1));
        assert_eq!(grid.rows().count(), 6);
    }

    #[test]
    fn month_grid_monday_first() {
        let grid = MonthGrid::build(ymd(2024, 2, 15), WeekStart::Monday, ymd(2000, 1, 1));
        assert_eq!(grid.cells[0].date, ymd(2024, 1, 29));
        assert_eq!(grid.weekday_labels()[0], "Mon");
        assert_eq!(grid.today_in_month(), 0);
    }

    #[test]
    fn month_grid_always_has_42_cells() {
        // Feb 2015 fits in four rows with Sunday start; the grid still pads to six.
        let grid = MonthGrid::build(ymd(2015, 2, 10), WeekStart::Sunday, ymd(2015, 2, 10));
        assert_eq!(grid.cells[0].date, ymd(2015, 2, 1));
        assert_eq!(grid.cells.len(), 42);
        assert_eq!(grid.cells.iter().filter(|c| !c.outside).count(), 28);
    }

    #[test]
    fn month_grid_marks_single_today() {
        let today = ymd(2024, 2, 20);
        let grid = MonthGrid::build(ymd(2024, 2, 1), WeekStart::Sunday, today);
        assert_eq!(grid.cells.iter().filter(|c| c.today).count(), 1);
        assert_eq!(grid.today_in_month(), 1);

        let other = MonthGrid::build(ymd(2024, 5, 1), WeekStart::Sunday, today);
        assert_eq!(other.today_in_month(), 0);
    }

    #[test]
    fn month_grid_click_surfaces_date() {
        let grid = MonthGrid::build(ymd(2024, 2, 15), WeekStart::Sunday, ymd(2024, 2, 15));
        assert_eq!(
            grid.click(2, 3),
            Some(CellTarget {
                day: ymd(2024, 2, 14),
                hour: None
            })
        );
        assert_eq!(grid.click(6, 0), None);
        assert_eq!(grid.click(0, 7), None);
    }

    #[test]
    fn hour_labels_use_twelve_hour_clock() {
        assert_eq!(format_hour_label(0), "12 AM");
        assert_eq!(format_hour_label(9), "9 AM");
        assert_eq!(format_hour_label(12), "12 PM");
        assert_eq!(format_hour_label(13), "1 PM");
        assert_eq!(format_hour_label(23), "11 PM");
    }

    #[test]
    fn hour_range_validation() {
        assert!(HourRange::new(8, 8).is_ok());
        assert!(HourRange::new(0, 23).is_ok());
        assert!(HourRange::new(10, 9).is_err());
        assert!(HourRange::new(5, 24).is_err());
        assert_eq!(HourRange::default().len(), 12);
    }

    #[test]
    fn week_grid_plain_has_seven_columns() {
        let grid = WeekGrid::build(ymd(2024, 2, 15), WeekStart::Monday, None, ymd(2024, 2, 15));
        assert_eq!(grid.days.len(), WEEK_DAYS);
        assert_eq!(grid.days[0].date, ymd(2024, 2, 12));
        assert_eq!(grid.days[6].date, ymd(2024, 2, 18));
        assert!(grid.days[3].today);
        assert_eq!(grid.cell_count(), 7);
        assert!(grid.hour_rows.is_empty());
        assert_eq!(
            grid.click(0, None),
            Some(CellTarget {
                day: ymd(2024, 2, 12),
                hour: None
            })
        );
        assert_eq!(grid.click(0, Some(9)), None);
    }

    #[test]
    fn week_grid_hourly_matrix() {
        let range = HourRange::new(9, 17).expect("valid range");
        let grid = WeekGrid::build(ymd(2024, 2, 15), WeekStart::Sunday, Some(range), ymd(2024, 2, 15));
        assert_eq!(grid.days.len(), 7);
        assert_eq!(grid.hour_rows.len(), 9);
        assert_eq!(grid.cell_count(), 9 * 7);
        assert_eq!(grid.hour_rows[0].label, "9 AM");
        assert_eq!(grid.hour_rows[8].label, "5 PM");
        assert_eq!(
            grid.click(6, Some(12)),
            Some(CellTarget {
                day: ymd(2024, 2, 17),
                hour: Some(12)
            })
        );
        assert_eq!(grid.click(1, Some(18)), None);
        assert_eq!(grid.click(7, Some(10)), None);
        assert_eq!(grid.click(1, None), None);
    }

    #[test]
    fn day_hours_and_year_grid() {
        let day = DayHours::build(ymd(2024, 2, 15), HourRange::default(), ymd(2024, 2, 15));
        assert!(day.today);
        assert_eq!(day.slots.len(), 12);
        assert_eq!(day.click(3).map(|t| t.hour), Some(Some(12)));

        let year = YearGrid::build(ymd(2024, 7, 4), WeekStart::Sunday, ymd(2024, 7, 4));
        assert_eq!(year.year, 2024);
        assert_eq!(year.months.len(), 12);
        assert!(year.months.iter().all(|m| m.cells.len() == 42));
        assert_eq!(year.months.iter().map(MonthGrid::today_in_month).sum::<usize>(), 1);
        assert_eq!(year.click(1, 0, 4).map(|t| t.day), Some(ymd(2024, 2, 1)));
    }

    #[test]
    fn injected_content_reaches_cells() {
        let content = FnContent(|day: NaiveDate, hour: Option<u32>| {
            (day.day() == 1 && hour.is_none()).then(|| "first".to_string())
        });
        assert_eq!(content.content(ymd(2024, 3, 1), None).as_deref(), Some("first"));
        assert_eq!(content.content(ymd(2024, 3, 2), None), None);
        assert_eq!(NoContent.content(ymd(2024, 3, 1), None), None);
    }
}
