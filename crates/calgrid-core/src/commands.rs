use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::cli::{GlobalCli, PageRequest};
use crate::config::{CalendarSettings, Config};
use crate::datetime::{CalendarZone, parse_date_expr};
use crate::grid::{NoContent, format_hour_label};
use crate::page::{AnchorListener, CalendarPage, NavAction};
use crate::render::Renderer;
use crate::route::Route;
use crate::title::TitleFormat;
use crate::view::ViewGranularity;

const SESSION_HELP: &str = "\
commands:
  p, prev              previous day/week/month/year
  n, next              next day/week/month/year
  t, today             jump to today
  d, date <expr>       jump to a date (2024-02-15, +2w, march, ...)
  v, view <view>       switch to daily, weekly, monthly or yearly
  h, hours             toggle the hourly weekly grid
  c, click <row> <col> select a grid cell
  ?, help              this text
  q, quit              leave";

/// Logs anchor moves; the page owns the state.
struct TraceListener;

impl AnchorListener for TraceListener {
    fn anchor_changed(&mut self, old: NaiveDate, new: NaiveDate) {
        info!(%old, %new, "anchor changed");
    }

    fn hours_toggled(&mut self, show_hours: bool) {
        info!(show_hours, "hourly grid toggled");
    }
}

#[instrument(skip_all)]
pub fn dispatch(
    cli: &GlobalCli,
    cfg: &Config,
    settings: &CalendarSettings,
    renderer: &Renderer,
    zone: CalendarZone,
) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();

    if cli.show_config {
        return cmd_show_config(&mut out, cfg);
    }

    let today = zone.today();
    let request = PageRequest::resolve(cli, settings, today)?;
    debug!(?request, %today, "dispatching page request");

    let Some(view) = request.route.view() else {
        warn!(route = %request.route.path(), "route has no calendar page");
        return renderer.print_notice(&mut out, request.route);
    };

    let page = CalendarPage::new(view, request.anchor, request.options).with_listener(TraceListener);
    let mut session = Session::new(page, &settings.title, renderer, cli.json);

    if cli.interactive {
        let stdin = io::stdin().lock();
        return run_session(stdin, &mut out, &mut session, || zone.today());
    }

    session.render(&mut out, today)
}

fn cmd_show_config<W: Write>(out: &mut W, cfg: &Config) -> anyhow::Result<()> {
    for path in &cfg.loaded_files {
        writeln!(out, "# loaded {}", path.display())?;
    }
    let sorted = cfg.iter().collect::<BTreeMap<_, _>>();
    for (key, value) in sorted {
        writeln!(out, "{key} = {value}")?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Nav(NavAction),
    Date(String),
    View(ViewGranularity),
    Click(usize, usize),
    Help,
    Quit,
    Empty,
}

impl SessionCommand {
    pub fn parse(line: &str) -> anyhow::Result<Self> {
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return Ok(Self::Empty);
        };
        let rest = parts.collect::<Vec<_>>();

        match head.to_ascii_lowercase().as_str() {
            "p" | "prev" => Ok(Self::Nav(NavAction::Prev)),
            "n" | "next" => Ok(Self::Nav(NavAction::Next)),
            "t" | "today" => Ok(Self::Nav(NavAction::Today)),
            "h" | "hours" => Ok(Self::Nav(NavAction::ToggleHours)),
            "d" | "date" => {
                if rest.is_empty() {
                    return Err(anyhow!("date requires an expression"));
                }
                Ok(Self::Date(rest.join(" ")))
            }
            "v" | "view" => {
                let key = rest
                    .first()
                    .ok_or_else(|| anyhow!("view requires daily, weekly, monthly or yearly"))?;
                Ok(Self::View(key.parse()?))
            }
            "c" | "click" => match rest.as_slice() {
                [row, col] => Ok(Self::Click(
                    row.parse().map_err(|_| anyhow!("invalid row: {row}"))?,
                    col.parse().map_err(|_| anyhow!("invalid column: {col}"))?,
                )),
                _ => Err(anyhow!("click requires <row> <col>")),
            },
            "?" | "help" => Ok(Self::Help),
            "q" | "quit" | "exit" => Ok(Self::Quit),
            other => Err(anyhow!("unknown command: {other} (try help)")),
        }
    }
}

/// Interactive state: the current page plus how to draw it.
pub struct Session<'a> {
    page: Option<CalendarPage>,
    title: &'a TitleFormat,
    renderer: &'a Renderer,
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Redraw,
    Stay,
    Quit,
}

impl<'a> Session<'a> {
    pub fn new(page: CalendarPage, title: &'a TitleFormat, renderer: &'a Renderer, json: bool) -> Self {
        Self {
            page: Some(page),
            title,
            renderer,
            json,
        }
    }

    pub fn page(&self) -> Option<&CalendarPage> {
        self.page.as_ref()
    }

    pub fn render<W: Write>(&self, out: &mut W, today: NaiveDate) -> anyhow::Result<()> {
        let page = self.page.as_ref().ok_or_else(|| anyhow!("session has no page"))?;
        let header = page.header(self.title);
        let body = page.body(today);
        if self.json {
            self.renderer.print_json(out, Route::Calendar(page.view()), page.anchor(), &header, &body)
        } else {
            self.renderer.print_page(out, &header, &body, &NoContent)
        }
    }

    #[instrument(skip(self, out))]
    pub fn handle<W: Write>(
        &mut self,
        command: SessionCommand,
        today: NaiveDate,
        out: &mut W,
    ) -> anyhow::Result<Flow> {
        let page = self.page.as_mut().ok_or_else(|| anyhow!("session has no page"))?;
        let flow = match command {
            SessionCommand::Nav(action) => redraw_if(page.apply(action, today)),
            SessionCommand::Date(expr) => {
                let date = parse_date_expr(&expr, today)?;
                redraw_if(page.apply(NavAction::Select(date), today))
            }
            SessionCommand::View(view) => {
                if view == page.view() {
                    Flow::Stay
                } else {
                    let current = self.page.take().ok_or_else(|| anyhow!("session has no page"))?;
                    self.page = Some(current.switch_view(view));
                    Flow::Redraw
                }
            }
            SessionCommand::Click(row, col) => match page.click(row, col, today) {
                Some(target) => {
                    match target.hour {
                        Some(hour) => writeln!(out, "selected {} {}", target.day, format_hour_label(hour))?,
                        None => writeln!(out, "selected {}", target.day)?,
                    }
                    redraw_if(page.apply(NavAction::Select(target.day), today))
                }
                None => {
                    writeln!(out, "no cell at row {row}, column {col}")?;
                    Flow::Stay
                }
            },
            SessionCommand::Help => {
                writeln!(out, "{SESSION_HELP}")?;
                Flow::Stay
            }
            SessionCommand::Quit => Flow::Quit,
            SessionCommand::Empty => Flow::Stay,
        };
        Ok(flow)
    }
}

fn redraw_if(changed: bool) -> Flow {
    if changed { Flow::Redraw } else { Flow::Stay }
}

/// Reads commands line by line until `quit` or end of input. Bad commands
/// are reported and the session keeps going.
#[instrument(skip_all)]
pub fn run_session<R, W, F>(
    input: R,
    out: &mut W,
    session: &mut Session<'_>,
    today: F,
) -> anyhow::Result<()>
where
    R: BufRead,
    W: Write,
    F: Fn() -> NaiveDate,
{
    session.render(out, today())?;

    for line in input.lines() {
        let line = line?;
        let today = today();
        let outcome = SessionCommand::parse(&line)
            .and_then(|command| session.handle(command, today, out));

        match outcome {
            Ok(Flow::Quit) => break,
            Ok(Flow::Redraw) => {
                writeln!(out)?;
                session.render(out, today)?;
            }
            Ok(Flow::Stay) => {}
            Err(err) => {
                warn!(input = %line, error = %err, "session command failed");
                writeln!(out, "error: {err:#}")?;
            }
        }
        out.flush()?;
    }

    info!("session finished");
    Ok(())
}
