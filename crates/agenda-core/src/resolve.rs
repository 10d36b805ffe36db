//! Per-day projection of events onto an hour grid.
//!
//! Every comparison here is on calendar dates, never on instants: an event
//! touches a day when the day falls inside its `[start date, end date]`
//! range, and its block on that day is measured in fractional hours from the
//! wall-clock times.

use chrono::{
  NaiveDate,
  Timelike
};
use serde::Serialize;

use crate::datetime::hours_of;
use crate::event::CalendarEvent;

const HOURS_PER_DAY: f64 = 24.0;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum DayKind {
  SingleDay,
  FirstDay,
  MiddleDay,
  LastDay
}

/// One event measured against one concrete date.
#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct DayProjection {
  pub event_id:       i64,
  pub kind:           DayKind,
  pub duration_hours: f64,
  pub top_offset_px:  f64
}

impl DayProjection {
  pub fn height_px(
    &self,
    row_height_px: f64
  ) -> f64 {
    self.duration_hours * row_height_px
  }
}

/// Classifies `day` against the event's date range.
///
/// Inverted ranges (end date before start date) only classify on their
/// start date; every other day is outside the range.
pub fn classify_day(
  event: &CalendarEvent,
  day: NaiveDate
) -> Option<DayKind> {
  let start = event.start_date();
  let end = event.end_date();

  if day == start {
    if start == end {
      Some(DayKind::SingleDay)
    } else {
      Some(DayKind::FirstDay)
    }
  } else if day > start && day < end {
    Some(DayKind::MiddleDay)
  } else if day == end && end > start {
    Some(DayKind::LastDay)
  } else {
    None
  }
}

pub fn resolve_for_day(
  event: &CalendarEvent,
  day: NaiveDate,
  row_height_px: f64
) -> Option<DayProjection> {
  let kind = classify_day(event, day)?;
  let start_hours =
    hours_of(event.start.time());
  let end_hours =
    hours_of(event.end.time());
  let start_minute_offset =
    f64::from(event.start.minute())
      / 60.0
      * row_height_px;

  let (duration, top_offset) =
    match kind {
      | DayKind::MiddleDay => {
        (HOURS_PER_DAY, 0.0)
      }
      | DayKind::SingleDay => (
        end_hours - start_hours,
        start_minute_offset
      ),
      | DayKind::FirstDay => (
        HOURS_PER_DAY - start_hours,
        start_minute_offset
      ),
      | DayKind::LastDay => {
        (end_hours, 0.0)
      }
    };

  if duration < 0.0 {
    tracing::debug!(
      event_id = event.id,
      %day,
      duration,
      "negative duration clamped"
    );
  }

  Some(DayProjection {
    event_id:       event.id,
    kind,
    duration_hours: duration.max(0.0),
    top_offset_px:  top_offset
  })
}

/// The hour row an event's block is anchored to on `day`.
///
/// Middle and last days are drawn once from the midnight row and overflow
/// downwards through their pixel height.
pub fn anchor_hour(
  event: &CalendarEvent,
  day: NaiveDate
) -> Option<u32> {
  match classify_day(event, day)? {
    | DayKind::SingleDay
    | DayKind::FirstDay => {
      Some(event.start.hour())
    }
    | DayKind::MiddleDay
    | DayKind::LastDay => Some(0)
  }
}

pub fn occurs_at_hour(
  event: &CalendarEvent,
  day: NaiveDate,
  hour: u32
) -> bool {
  anchor_hour(event, day) == Some(hour)
}
