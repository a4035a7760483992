use serde::Serialize;

use crate::view::ViewGranularity;

const MAX_REDIRECTS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "route", content = "view", rename_all = "snake_case")]
pub enum Route {
    Root,
    Login,
    Signup,
    CalendarIndex,
    Calendar(ViewGranularity),
    NotFound,
}

impl Route {
    /// Matches one path without following redirects. Matching ignores case,
    /// trailing slashes, query strings and fragments.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if !trimmed.starts_with('/')
            && let Some(view) = ViewGranularity::from_key(trimmed)
        {
            return Self::Calendar(view);
        }

        let path = normalize(trimmed);
        let segments = path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>();

        match segments.as_slice() {
            [] => Self::Root,
            ["login"] => Self::Login,
            ["signup"] => Self::Signup,
            ["calendar"] => Self::CalendarIndex,
            ["calendar", view] => match *view {
                "daily" => Self::Calendar(ViewGranularity::Daily),
                "weekly" => Self::Calendar(ViewGranularity::Weekly),
                "monthly" => Self::Calendar(ViewGranularity::Monthly),
                "yearly" => Self::Calendar(ViewGranularity::Yearly),
                _ => Self::NotFound,
            },
            _ => Self::NotFound,
        }
    }

    pub fn redirect(self) -> Option<Self> {
        match self {
            Self::Root => Some(Self::Login),
            Self::CalendarIndex => Some(Self::Calendar(ViewGranularity::Monthly)),
            _ => None,
        }
    }

    pub fn path(self) -> String {
        match self {
            Self::Root => "/".to_string(),
            Self::Login => "/login".to_string(),
            Self::Signup => "/signup".to_string(),
            Self::CalendarIndex => "/calendar".to_string(),
            Self::Calendar(view) => format!("/calendar/{}", view.as_key()),
            Self::NotFound => "*".to_string(),
        }
    }

    pub fn view(self) -> Option<ViewGranularity> {
        match self {
            Self::Calendar(view) => Some(view),
            _ => None,
        }
    }
}

/// Parses `raw` and follows redirects to a terminal route.
#[tracing::instrument(level = "debug")]
pub fn resolve(raw: &str) -> Route {
    let mut route = Route::parse(raw);
    for _ in 0..MAX_REDIRECTS {
        let Some(next) = route.redirect() else {
            return route;
        };
        tracing::debug!(from = %route.path(), to = %next.path(), "following redirect");
        route = next;
    }

    tracing::warn!(path = raw, "redirect limit reached");
    Route::NotFound
}

fn normalize(raw: &str) -> String {
    let path = raw
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}
