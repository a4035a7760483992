use std::io::{self, IsTerminal, Write};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::config::CalendarSettings;
use crate::grid::{CellContent, DayHours, GridCell, MonthGrid, WeekGrid, YearGrid};
use crate::page::{Header, PageBody, ViewTab};
use crate::route::Route;

const YEAR_COLUMNS: usize = 3;
const MINI_MONTH_WIDTH: usize = 20;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

#[derive(Debug, Serialize)]
struct PageSnapshot<'a> {
    route: String,
    anchor: NaiveDate,
    header: &'a Header,
    body: &'a PageBody,
}

impl Renderer {
    pub fn new(settings: &CalendarSettings) -> Self {
        Self {
            color: settings.color && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all, fields(title = %header.title))]
    pub fn print_page<W: Write>(
        &self,
        out: &mut W,
        header: &Header,
        body: &PageBody,
        content: &dyn CellContent,
    ) -> anyhow::Result<()> {
        self.print_header(out, header)?;
        writeln!(out)?;
        match body {
            PageBody::Monthly(grid) => self.print_month(out, grid, content),
            PageBody::Weekly(grid) => self.print_week(out, grid, content),
            PageBody::Daily(day) => self.print_day(out, day, content),
            PageBody::Yearly(year) => self.print_year(out, year),
        }
    }

    pub fn print_json<W: Write>(
        &self,
        out: &mut W,
        route: Route,
        anchor: NaiveDate,
        header: &Header,
        body: &PageBody,
    ) -> anyhow::Result<()> {
        let snapshot = PageSnapshot {
            route: route.path(),
            anchor,
            header,
            body,
        };
        serde_json::to_writer_pretty(&mut *out, &snapshot)?;
        writeln!(out)?;
        Ok(())
    }

    /// Static pages that have no calendar body.
    pub fn print_notice<W: Write>(&self, out: &mut W, route: Route) -> anyhow::Result<()> {
        let text = match route {
            Route::Login | Route::Signup => format!(
                "{} is handled by the account service; open a calendar route instead.",
                route.path()
            ),
            _ => "404 route not found".to_string(),
        };
        writeln!(out, "{}", self.paint(&text, "33"))?;
        Ok(())
    }

    fn print_header<W: Write>(&self, out: &mut W, header: &Header) -> anyhow::Result<()> {
        let tabs = header
            .tabs
            .iter()
            .map(|tab| self.tab(tab))
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(
            out,
            "←  {}  →    [Today]    {}",
            self.paint(&header.title, "1"),
            tabs
        )?;
        Ok(())
    }

    fn tab(&self, tab: &ViewTab) -> String {
        match (tab.active, self.color) {
            (true, true) => self.paint(&format!(" {} ", tab.label), "7"),
            (true, false) => format!("<{}>", tab.label),
            (false, _) => tab.label.to_string(),
        }
    }

    /// Today is reversed in colour and starred in plain output.
    fn mark_today(&self, mut text: String, today: bool) -> String {
        if !today {
            return text;
        }
        if !self.color {
            text.push('*');
        }
        self.paint(&text, "7")
    }

    fn print_month<W: Write>(
        &self,
        out: &mut W,
        grid: &MonthGrid,
        content: &dyn CellContent,
    ) -> anyhow::Result<()> {
        let headers = grid
            .weekday_labels()
            .iter()
            .map(|label| label.to_string())
            .collect::<Vec<_>>();
        let rows = grid
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| self.month_cell(cell, content))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        write_table(out, headers, rows)
    }

    fn month_cell(&self, cell: &GridCell, content: &dyn CellContent) -> String {
        let mut text = format!("{:>2}", cell.date.day());
        if cell.today && !self.color {
            text.push('*');
        }
        if let Some(extra) = content.content(cell.date, None) {
            text.push(' ');
            text.push_str(&extra);
        }
        if cell.today {
            self.paint(&text, "7")
        } else if cell.outside {
            self.paint(&text, "2")
        } else {
            text
        }
    }

    fn print_week<W: Write>(
        &self,
        out: &mut W,
        grid: &WeekGrid,
        content: &dyn CellContent,
    ) -> anyhow::Result<()> {
        let day_heads = grid
            .days
            .iter()
            .map(|column| {
                self.mark_today(column.date.format("%a %b %-d").to_string(), column.today)
            })
            .collect::<Vec<_>>();

        if !grid.is_hourly() {
            let row = grid
                .days
                .iter()
                .map(|column| content.content(column.date, None).unwrap_or_default())
                .collect::<Vec<_>>();
            return write_table(out, day_heads, vec![row]);
        }

        let mut headers = vec![String::new()];
        headers.extend(day_heads);
        let rows = grid
            .hour_rows
            .iter()
            .map(|hour_row| {
                let mut row = vec![hour_row.label.clone()];
                row.extend(
                    hour_row
                        .cells
                        .iter()
                        .map(|cell| content.content(cell.day, Some(cell.hour)).unwrap_or_default()),
                );
                row
            })
            .collect::<Vec<_>>();
        write_table(out, headers, rows)
    }

    fn print_day<W: Write>(
        &self,
        out: &mut W,
        day: &DayHours,
        content: &dyn CellContent,
    ) -> anyhow::Result<()> {
        let head = self.mark_today(day.date.format("%A %b %-d").to_string(), day.today);
        let rows = day
            .slots
            .iter()
            .map(|slot| {
                vec![
                    slot.label.clone(),
                    content.content(day.date, Some(slot.hour)).unwrap_or_default(),
                ]
            })
            .collect::<Vec<_>>();
        write_table(out, vec!["Hour".to_string(), head], rows)
    }

    fn print_year<W: Write>(&self, out: &mut W, year: &YearGrid) -> anyhow::Result<()> {
        for chunk in year.months.chunks(YEAR_COLUMNS) {
            let blocks = chunk
                .iter()
                .map(|month| self.mini_month(month))
                .collect::<Vec<_>>();
            let height = blocks.iter().map(Vec::len).max().unwrap_or(0);
            for line in 0..height {
                let joined = blocks
                    .iter()
                    .map(|block| block.get(line).cloned().unwrap_or_else(|| " ".repeat(MINI_MONTH_WIDTH)))
                    .collect::<Vec<_>>()
                    .join("   ");
                writeln!(out, "{}", joined.trim_end())?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    fn mini_month(&self, grid: &MonthGrid) -> Vec<String> {
        let title = grid.anchor.format("%B").to_string();
        let mut lines = vec![pad_center(&title, MINI_MONTH_WIDTH)];
        lines.push(
            grid.weekday_labels()
                .iter()
                .map(|label| label.chars().take(2).collect::<String>())
                .collect::<Vec<_>>()
                .join(" "),
        );
        for row in grid.rows() {
            let cells = row
                .iter()
                .map(|cell| {
                    if cell.outside {
                        "  ".to_string()
                    } else if cell.today {
                        self.paint(&format!("{:>2}", cell.date.day()), "7")
                    } else {
                        format!("{:>2}", cell.date.day())
                    }
                })
                .collect::<Vec<_>>();
            lines.push(cells.join(" "));
        }
        lines
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn pad_center(text: &str, width: usize) -> String {
    let visible = UnicodeWidthStr::width(text);
    let total = width.saturating_sub(visible);
    let left = total / 2;
    format!("{}{}{}", " ".repeat(left), text, " ".repeat(total - left))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(header).as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    write_row(&mut writer, &headers, &widths)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = width)?;
    }
    writeln!(writer)?;

    for row in rows {
        write_row(&mut writer, &row, &widths)?;
    }

    Ok(())
}

fn write_row<W: Write>(writer: &mut W, cells: &[String], widths: &[usize]) -> anyhow::Result<()> {
    let mut line = String::new();
    for (idx, width) in widths.iter().enumerate() {
        let cell = cells.get(idx).map(String::as_str).unwrap_or_default();
        let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
        let padding = width.saturating_sub(visible_width);
        line.push_str(cell);
        line.push_str(&" ".repeat(padding));
        line.push(' ');
    }
    writeln!(writer, "{}", line.trim_end())?;
    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::WeekStart;
    use crate::grid::{FnContent, HourRange, NoContent};
    use crate::title::TitleFormat;
    use crate::page::{CalendarPage, PageOptions};
    use crate::view::ViewGranularity;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn render(view: ViewGranularity, options: PageOptions, content: &dyn CellContent) -> String {
        let today = ymd(2024, 2, 15);
        let page = CalendarPage::new(view, today, options);
        let mut out = Vec::new();
        Renderer::plain()
            .print_page(&mut out, &page.header(&TitleFormat::default()), &page.body(today), content)
            .expect("render page");
        String::from_utf8(out).expect("utf8 output")
    }

    #[test]
    fn month_page_lists_six_weeks() {
        let text = render(ViewGranularity::Monthly, PageOptions::default(), &NoContent);
        let lines = text.lines().collect::<Vec<_>>();
        assert!(lines[0].contains("February 2024"));
        assert!(lines[0].ends_with("Yearly  <Monthly>  Weekly  Daily"));
        assert!(lines[2].starts_with("Sun Mon Tue"));
        // header, blank, labels, rule, six weeks
        assert_eq!(lines.len(), 10);
        assert!(lines[4].starts_with("28  29  30  31"));
        assert!(text.contains("15*"));
    }

    #[test]
    fn week_page_shows_hours_and_content() {
        let options = PageOptions {
            week_start: WeekStart::Monday,
            show_hours: true,
            hours: HourRange::new(8, 10).expect("valid range"),
        };
        let content = FnContent(|day: NaiveDate, hour: Option<u32>| {
            (day.day() == 14 && hour == Some(9)).then(|| "standup".to_string())
        });
        let text = render(ViewGranularity::Weekly, options, &content);
        assert!(text.contains("Mon Feb 12"));
        assert!(text.contains("Thu Feb 15*"));
        assert!(!text.contains("Wed Feb 14*"));
        assert!(text.lines().next().expect("header").ends_with("<Weekly>  Daily"));
        assert!(text.contains("Sun Feb 18"));
        assert!(text.contains("8 AM"));
        assert!(text.contains("10 AM"));
        let nine = text
            .lines()
            .find(|line| line.starts_with("9 AM"))
            .expect("9 AM row");
        assert!(nine.contains("standup"));
    }

    #[test]
    fn year_page_has_every_month() {
        let text = render(ViewGranularity::Yearly, PageOptions::default(), &NoContent);
        assert!(text.starts_with("←  2024  →"));
        for month in ["January", "June", "December"] {
            assert!(text.contains(month), "missing {month}");
        }
    }

    #[test]
    fn json_snapshot_and_notices() {
        let today = ymd(2024, 2, 15);
        let page = CalendarPage::new(ViewGranularity::Daily, today, PageOptions::default());
        let mut out = Vec::new();
        Renderer::plain()
            .print_json(
                &mut out,
                Route::Calendar(ViewGranularity::Daily),
                today,
                &page.header(&TitleFormat::default()),
                &page.body(today),
            )
            .expect("render json");
        let value: serde_json::Value = serde_json::from_slice(&out).expect("valid json");
        assert_eq!(value["route"], "/calendar/daily");
        assert_eq!(value["header"]["title"], "Thursday, February 15, 2024");
        assert_eq!(value["body"]["kind"], "daily");
        assert_eq!(value["body"]["slots"][0]["label"], "9 AM");
        let tabs = value["header"]["tabs"].as_array().expect("tabs");
        assert_eq!(tabs.len(), 4);
        assert_eq!(tabs[0]["label"], "Yearly");
        assert_eq!(tabs[3]["path"], "/calendar/daily");
        assert_eq!(tabs[3]["active"], true);
        assert_eq!(tabs[1]["active"], false);

        let mut out = Vec::new();
        Renderer::plain()
            .print_notice(&mut out, Route::NotFound)
            .expect("render notice");
        assert_eq!(String::from_utf8(out).expect("utf8"), "404 route not found\n");
    }

    #[test]
    fn day_page_stars_today_in_plain_mode() {
        let text = render(ViewGranularity::Daily, PageOptions::default(), &NoContent);
        assert!(text.contains("Thursday Feb 15*"));
        assert!(text.lines().next().expect("header").ends_with("<Daily>"));
    }
}
