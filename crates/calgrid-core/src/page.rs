use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::dates::WeekStart;
use crate::grid::{CellTarget, DayHours, HourRange, MonthGrid, WEEK_DAYS, WeekGrid, YearGrid};
use crate::route::Route;
use crate::title::{TitleFormat, format_header_title};
use crate::view::{Direction, ViewGranularity, next_anchor};

/// Notified whenever the page's anchor moves. Both hooks default to no-ops.
pub trait AnchorListener {
    fn anchor_changed(&mut self, _old: NaiveDate, _new: NaiveDate) {}

    fn hours_toggled(&mut self, _show_hours: bool) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoListener;

impl AnchorListener for NoListener {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    Prev,
    Next,
    Today,
    Select(NaiveDate),
    ToggleHours,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    pub week_start: WeekStart,
    pub show_hours: bool,
    pub hours: HourRange,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            week_start: WeekStart::Sunday,
            show_hours: false,
            hours: HourRange::default(),
        }
    }
}

/// One entry of the view switcher, linking to its calendar route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewTab {
    pub view: ViewGranularity,
    pub label: &'static str,
    pub path: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub view: ViewGranularity,
    pub title: String,
    pub tabs: Vec<ViewTab>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PageBody {
    Daily(DayHours),
    Weekly(WeekGrid),
    Monthly(MonthGrid),
    Yearly(YearGrid),
}

/// One calendar page: the single owner of the anchor date.
pub struct CalendarPage {
    view: ViewGranularity,
    anchor: NaiveDate,
    options: PageOptions,
    listener: Box<dyn AnchorListener>,
}

impl std::fmt::Debug for CalendarPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarPage")
            .field("view", &self.view)
            .field("anchor", &self.anchor)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl CalendarPage {
    pub fn new(view: ViewGranularity, anchor: NaiveDate, options: PageOptions) -> Self {
        Self {
            view,
            anchor,
            options,
            listener: Box::new(NoListener),
        }
    }

    pub fn with_listener(mut self, listener: impl AnchorListener + 'static) -> Self {
        self.listener = Box::new(listener);
        self
    }

    /// Same anchor and options on a different view.
    pub fn switch_view(self, view: ViewGranularity) -> Self {
        Self { view, ..self }
    }

    pub fn view(&self) -> ViewGranularity {
        self.view
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub fn options(&self) -> PageOptions {
        self.options
    }

    pub fn header(&self, format: &TitleFormat) -> Header {
        let tabs = ViewGranularity::all()
            .into_iter()
            .map(|view| ViewTab {
                view,
                label: view.label(),
                path: Route::Calendar(view).path(),
                active: view == self.view,
            })
            .collect();
        Header {
            view: self.view,
            title: format_header_title(self.view, self.anchor, format),
            tabs,
        }
    }

    pub fn body(&self, today: NaiveDate) -> PageBody {
        let PageOptions {
            week_start,
            show_hours,
            hours,
        } = self.options;
        match self.view {
            ViewGranularity::Daily => PageBody::Daily(DayHours::build(self.anchor, hours, today)),
            ViewGranularity::Weekly => PageBody::Weekly(WeekGrid::build(
                self.anchor,
                week_start,
                show_hours.then_some(hours),
                today,
            )),
            ViewGranularity::Monthly => {
                PageBody::Monthly(MonthGrid::build(self.anchor, week_start, today))
            }
            ViewGranularity::Yearly => {
                PageBody::Yearly(YearGrid::build(self.anchor, week_start, today))
            }
        }
    }

    /// Returns whether the page changed.
    #[tracing::instrument(skip(self), fields(view = %self.view, anchor = %self.anchor))]
    pub fn apply(&mut self, action: NavAction, today: NaiveDate) -> bool {
        let next = match action {
            NavAction::Prev => next_anchor(self.view, self.anchor, Direction::Prev),
            NavAction::Next => next_anchor(self.view, self.anchor, Direction::Next),
            NavAction::Today => today,
            NavAction::Select(date) => date,
            NavAction::ToggleHours => {
                if self.view != ViewGranularity::Weekly {
                    debug!("hour toggle ignored outside the weekly view");
                    return false;
                }
                self.options.show_hours = !self.options.show_hours;
                self.listener.hours_toggled(self.options.show_hours);
                return true;
            }
        };

        if next == self.anchor {
            return false;
        }
        let old = std::mem::replace(&mut self.anchor, next);
        debug!(%old, new = %next, "anchor moved");
        self.listener.anchor_changed(old, next);
        true
    }

    /// Surfaces the clicked cell; what a click means is up to the caller.
    /// Month grids use `row`/`col`, week grids use `col` plus `row` as the
    /// hour index when hourly, the day view uses `row`, and the year view
    /// treats `row` as the month index and `col` as the day cell.
    pub fn click(&self, row: usize, col: usize, today: NaiveDate) -> Option<CellTarget> {
        match self.body(today) {
            PageBody::Monthly(grid) => grid.click(row, col),
            PageBody::Weekly(grid) => {
                let hour = match grid.hours {
                    Some(range) => Some(range.start().checked_add(u32::try_from(row).ok()?)?),
                    None if row == 0 => None,
                    None => return None,
                };
                grid.click(col, hour)
            }
            PageBody::Daily(day) => day.click(row),
            PageBody::Yearly(year) => year.click(row, col / WEEK_DAYS, col % WEEK_DAYS),
        }
    }
}
