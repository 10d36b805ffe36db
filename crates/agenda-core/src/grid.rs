//! Day and week grids: events resolved per day, anchored to hour rows and
//! tiled per row, plus the current-time overlay.

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::datetime::week_days;
use crate::event::CalendarEvent;
use crate::index::DayIndex;
use crate::indicator::{CurrentTimeLine, IndicatorPolicy, ViewMode, current_time_line};
use crate::layout::layout_row;
use crate::resolve::{DayKind, anchor_hour, resolve_for_day};

pub const HOURS: u32 = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct GridSettings {
    pub timezone: Tz,
    pub row_height_px: f64,
    pub gutter_pct: f64,
    pub week_start: Weekday,
    pub policy: IndicatorPolicy,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            timezone: crate::datetime::default_timezone(),
            row_height_px: 60.0,
            gutter_pct: crate::layout::DEFAULT_GUTTER_PCT,
            week_start: Weekday::Mon,
            policy: IndicatorPolicy::Current,
        }
    }
}

/// What the renderer draws for one event in one hour cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub event_id: i64,
    pub title: String,
    pub color: Option<String>,
    pub openable: bool,
    pub kind: DayKind,
    pub duration_hours: f64,
    pub top_offset_px: f64,
    pub height_px: f64,
    pub width_pct: f64,
    pub left_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourCell {
    pub hour: u32,
    pub placements: Vec<Placement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayColumn {
    pub date: NaiveDate,
    pub all_day: Vec<i64>,
    pub hours: Vec<HourCell>,
}

impl DayColumn {
    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.hours.iter().flat_map(|cell| cell.placements.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridView {
    pub mode: ViewMode,
    pub days: Vec<DayColumn>,
    pub now_line: CurrentTimeLine,
}

pub fn build_day_view(
    events: &[CalendarEvent],
    focus: NaiveDate,
    settings: &GridSettings,
    now: DateTime<Utc>,
) -> GridView {
    build_view(events, vec![focus], ViewMode::Day, settings, now)
}

pub fn build_week_view(
    events: &[CalendarEvent],
    focus: NaiveDate,
    settings: &GridSettings,
    now: DateTime<Utc>,
) -> GridView {
    let days = week_days(focus, settings.week_start);
    build_view(events, days, ViewMode::Week, settings, now)
}

#[instrument(skip(events, settings, now), fields(events = events.len(), days = days.len()))]
fn build_view(
    events: &[CalendarEvent],
    days: Vec<NaiveDate>,
    mode: ViewMode,
    settings: &GridSettings,
    now: DateTime<Utc>,
) -> GridView {
    let first = days.first().copied().unwrap_or_else(|| now.date_naive());
    let last = days.last().copied().unwrap_or(first);
    let index = DayIndex::build(events, first..=last);

    let columns = days
        .iter()
        .map(|day| build_day_column(events, &index, *day, settings))
        .collect::<Vec<_>>();

    let now_line = current_time_line(
        now,
        settings.timezone,
        &days,
        mode,
        settings.policy,
        settings.row_height_px,
    );

    debug!(
        placements = columns.iter().map(|c| c.placements().count()).sum::<usize>(),
        now_visible = now_line.visible,
        "grid built"
    );

    GridView {
        mode,
        days: columns,
        now_line,
    }
}

fn build_day_column(
    events: &[CalendarEvent],
    index: &DayIndex,
    day: NaiveDate,
    settings: &GridSettings,
) -> DayColumn {
    let mut all_day = Vec::new();
    let mut rows: Vec<Vec<&CalendarEvent>> = vec![Vec::new(); HOURS as usize];

    for event in index.events_on(events, day) {
        if event.is_all_day {
            all_day.push(event.id);
            continue;
        }
        if let Some(hour) = anchor_hour(event, day)
            && let Some(row) = rows.get_mut(hour as usize)
        {
            row.push(event);
        }
    }

    let hours = rows
        .into_iter()
        .enumerate()
        .map(|(hour, row)| HourCell {
            hour: hour as u32,
            placements: place_row(&row, day, settings),
        })
        .collect();

    DayColumn {
        date: day,
        all_day,
        hours,
    }
}

fn place_row(row: &[&CalendarEvent], day: NaiveDate, settings: &GridSettings) -> Vec<Placement> {
    let ids = row.iter().map(|event| event.id).collect::<Vec<_>>();
    let slots = layout_row(&ids, settings.gutter_pct);

    row.iter()
        .zip(slots)
        .filter_map(|(event, slot)| {
            let projection = resolve_for_day(event, day, settings.row_height_px)?;
            Some(Placement {
                event_id: event.id,
                title: event.title.clone(),
                color: event.color.clone(),
                openable: event.is_openable,
                kind: projection.kind,
                duration_hours: projection.duration_hours,
                top_offset_px: projection.top_offset_px,
                height_px: projection.height_px(settings.row_height_px),
                width_pct: slot.width_pct,
                left_pct: slot.left_pct,
            })
        })
        .collect()
}
