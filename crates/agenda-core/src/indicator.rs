use std::str::FromStr;

use anyhow::anyhow;
use chrono::{
  DateTime,
  NaiveDate,
  Timelike,
  Utc
};
use chrono_tz::Tz;
use serde::{
  Deserialize,
  Serialize
};

/// Source of "now" for the grid. The host ticks and re-renders; the engine
/// only reads the clock.
pub trait Clock {
  fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(
  pub DateTime<Utc>
);

impl Clock for FixedClock {
  fn now(&self) -> DateTime<Utc> {
    self.0
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum IndicatorPolicy {
  #[default]
  Current,
  Always,
  FullWeek
}

impl IndicatorPolicy {
  pub fn as_key(self) -> &'static str {
    match self {
      | Self::Current => "current",
      | Self::Always => "always",
      | Self::FullWeek => "full-week"
    }
  }
}

impl FromStr for IndicatorPolicy {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "current" => Ok(Self::Current),
      | "always" => Ok(Self::Always),
      | "full-week" | "full_week" => {
        Ok(Self::FullWeek)
      }
      | other => Err(anyhow!(
        "unknown indicator policy: \
         {other}"
      ))
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
  Day,
  Week
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
)]
#[serde(
  tag = "kind",
  content = "column",
  rename_all = "kebab-case"
)]
pub enum LineSpan {
  Column(usize),
  FullWidth
}

#[derive(
  Debug, Clone, PartialEq, Serialize,
)]
pub struct CurrentTimeLine {
  pub offset_px: f64,
  pub visible:   bool,
  pub label:     String,
  pub span:      LineSpan
}

/// Vertical offset of "now" in the grid, read in `timezone`.
///
/// The offset follows the local wall clock so the line sits on the same
/// hour rows as the events. On a fall-back day the repeated hour is drawn
/// twice, and on a spring-forward day the skipped hour is never crossed.
pub fn current_offset(
  now: DateTime<Utc>,
  timezone: Tz,
  row_height_px: f64
) -> f64 {
  let local = now.with_timezone(&timezone);
  (f64::from(local.hour())
    + f64::from(local.minute()) / 60.0)
    * row_height_px
}

/// Builds the overlay line for the visible `days`.
pub fn current_time_line(
  now: DateTime<Utc>,
  timezone: Tz,
  days: &[NaiveDate],
  mode: ViewMode,
  policy: IndicatorPolicy,
  row_height_px: f64
) -> CurrentTimeLine {
  let local = now.with_timezone(&timezone);
  let today = local.date_naive();
  let column = days
    .iter()
    .position(|day| *day == today);

  let visible = match policy {
    | IndicatorPolicy::Always => true,
    | IndicatorPolicy::Current
    | IndicatorPolicy::FullWeek => {
      column.is_some()
    }
  };

  let span = match (policy, mode, column)
  {
    | (
      IndicatorPolicy::FullWeek,
      ViewMode::Week,
      _
    ) => LineSpan::FullWidth,
    | (_, _, Some(index)) => {
      LineSpan::Column(index)
    }
    | (_, _, None) => LineSpan::FullWidth
  };

  CurrentTimeLine {
    offset_px: current_offset(
      now,
      timezone,
      row_height_px
    ),
    visible,
    label: local
      .format("%H:%M")
      .to_string(),
    span
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    DateTime,
    Duration,
    NaiveDate,
    TimeZone,
    Utc
  };

  use super::{
    IndicatorPolicy,
    LineSpan,
    ViewMode,
    current_offset,
    current_time_line
  };
  use crate::datetime::week_days;

  const ROME: chrono_tz::Tz =
    chrono_tz::Europe::Rome;

  fn utc(
    y: i32,
    mo: u32,
    d: u32,
    h: u32,
    mi: u32
  ) -> DateTime<Utc> {
    Utc
      .with_ymd_and_hms(y, mo, d, h, mi, 0)
      .single()
      .expect("valid instant")
  }

  #[test]
  fn offset_is_read_in_grid_timezone() {
    // 08:30 UTC is 10:30 in Rome in June.
    let now = utc(2024, 6, 10, 8, 30);
    assert_eq!(
      current_offset(now, ROME, 60.0),
      630.0
    );
    assert_eq!(
      current_offset(
        now,
        chrono_tz::UTC,
        60.0
      ),
      510.0
    );
  }

  #[test]
  fn offset_grows_through_the_day_and_resets() {
    // Local midnight in Rome (CEST) is 22:00 UTC.
    let midnight = utc(2024, 6, 9, 22, 0);
    assert_eq!(
      current_offset(midnight, ROME, 60.0),
      0.0
    );

    let mut last = 0.0;
    for minutes in (0..24 * 60).step_by(7) {
      let offset = current_offset(
        midnight
          + Duration::minutes(minutes),
        ROME,
        60.0
      );
      assert!(offset >= last);
      last = offset;
    }

    assert_eq!(
      current_offset(
        midnight + Duration::days(1),
        ROME,
        60.0
      ),
      0.0
    );
  }

  #[test]
  fn offset_follows_wall_clock_across_dst_changes() {
    // 2024-10-27: 03:00 CEST falls back to 02:00 CET at 01:00 UTC.
    assert_eq!(
      current_offset(
        utc(2024, 10, 27, 0, 59),
        ROME,
        60.0
      ),
      179.0
    );
    assert_eq!(
      current_offset(
        utc(2024, 10, 27, 1, 0),
        ROME,
        60.0
      ),
      120.0
    );

    let midnight = utc(2024, 10, 26, 22, 0);
    let mut last = 0.0;
    let mut backward_steps = 0;
    for minutes in 0..25 * 60 {
      let offset = current_offset(
        midnight
          + Duration::minutes(minutes),
        ROME,
        60.0
      );
      if offset < last {
        backward_steps += 1;
      }
      last = offset;
    }
    assert_eq!(backward_steps, 1);
    assert_eq!(last, 23.0 * 60.0 + 59.0);

    // 2024-03-31: 02:00 CET jumps to 03:00 CEST at 01:00 UTC.
    assert_eq!(
      current_offset(
        utc(2024, 3, 31, 0, 59),
        ROME,
        60.0
      ),
      119.0
    );
    assert_eq!(
      current_offset(
        utc(2024, 3, 31, 1, 0),
        ROME,
        60.0
      ),
      180.0
    );
  }

  #[test]
  fn current_policy_hides_line_outside_range() {
    let now = utc(2024, 6, 12, 9, 0);
    let other_week = week_days(
      NaiveDate::from_ymd_opt(2024, 6, 3)
        .expect("valid date"),
      chrono::Weekday::Mon
    );
    let line = current_time_line(
      now,
      ROME,
      &other_week,
      ViewMode::Week,
      IndicatorPolicy::Current,
      60.0
    );
    assert!(!line.visible);

    let always = current_time_line(
      now,
      ROME,
      &other_week,
      ViewMode::Week,
      IndicatorPolicy::Always,
      60.0
    );
    assert!(always.visible);
    assert_eq!(
      always.span,
      LineSpan::FullWidth
    );
    assert_eq!(always.label, "11:00");
  }

  #[test]
  fn full_week_spans_whole_grid() {
    let now = utc(2024, 6, 12, 9, 0);
    let week = week_days(
      NaiveDate::from_ymd_opt(2024, 6, 12)
        .expect("valid date"),
      chrono::Weekday::Mon
    );
    let current = current_time_line(
      now,
      ROME,
      &week,
      ViewMode::Week,
      IndicatorPolicy::Current,
      60.0
    );
    assert_eq!(
      current.span,
      LineSpan::Column(2)
    );

    let full = current_time_line(
      now,
      ROME,
      &week,
      ViewMode::Week,
      IndicatorPolicy::FullWeek,
      60.0
    );
    assert!(full.visible);
    assert_eq!(
      full.span,
      LineSpan::FullWidth
    );

    let day_view = current_time_line(
      now,
      ROME,
      &week[2..3],
      ViewMode::Day,
      IndicatorPolicy::FullWeek,
      60.0
    );
    assert_eq!(
      day_view.span,
      LineSpan::Column(0)
    );
  }

  #[test]
  fn parses_policy_keys() {
    assert_eq!(
      "full-week"
        .parse::<IndicatorPolicy>()
        .expect("policy"),
      IndicatorPolicy::FullWeek
    );
    assert!(
      "sometimes"
        .parse::<IndicatorPolicy>()
        .is_err()
    );
  }
}
