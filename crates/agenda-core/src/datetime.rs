use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Datelike,
  Duration,
  NaiveDate,
  NaiveTime,
  Timelike,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;

pub const TIMEZONE_ENV_VAR: &str =
  "AGENDA_TIMEZONE";
pub const DEFAULT_TIMEZONE: &str =
  "Europe/Rome";

pub fn default_timezone() -> Tz {
  chrono_tz::Europe::Rome
}

/// Parses the configured grid timezone, falling back to Europe/Rome.
pub fn resolve_timezone(
  configured: Option<&str>
) -> Tz {
  configured
    .and_then(|raw| {
      parse_timezone(raw, "config")
    })
    .unwrap_or_else(default_timezone)
}

pub fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "configured grid timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

fn wall_time_regex()
-> Option<&'static Regex> {
  static WALL_TIME: OnceLock<
    Option<Regex>
  > = OnceLock::new();
  WALL_TIME
    .get_or_init(|| {
      Regex::new(
        r"^(?P<hour>\d{1,2}):(?P<minute>\d{2})(?::\d{2})?$"
      )
      .ok()
    })
    .as_ref()
}

/// Parses a wall-clock `HH:MM` value. Trailing seconds are accepted and
/// dropped.
pub fn parse_wall_time(
  raw: &str
) -> Option<NaiveTime> {
  let captures = wall_time_regex()?
    .captures(raw.trim())?;
  let hour = captures
    .name("hour")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  let minute = captures
    .name("minute")?
    .as_str()
    .parse::<u32>()
    .ok()?;
  NaiveTime::from_hms_opt(
    hour, minute, 0
  )
}

/// Parses a calendar date. The backend sends either `YYYY-MM-DD` or a full
/// RFC 3339 timestamp; timestamps are read in the grid timezone.
pub fn parse_calendar_date(
  raw: &str,
  timezone: Tz
) -> Option<NaiveDate> {
  let trimmed = raw.trim();
  if let Ok(date) =
    NaiveDate::parse_from_str(
      trimmed, "%Y-%m-%d"
    )
  {
    return Some(date);
  }

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(
      trimmed
    )
  {
    return Some(
      dt.with_timezone(&timezone)
        .date_naive()
    );
  }

  NaiveDate::parse_from_str(
    trimmed.get(..10)?,
    "%Y-%m-%d"
  )
  .ok()
}

#[must_use]
pub fn hours_of(time: NaiveTime) -> f64 {
  f64::from(time.hour())
    + f64::from(time.minute()) / 60.0
}

#[must_use]
pub fn today_in(
  timezone: Tz,
  now: DateTime<Utc>
) -> NaiveDate {
  now.with_timezone(&timezone)
    .date_naive()
}

pub fn add_days(
  date: NaiveDate,
  days: i64
) -> NaiveDate {
  date
    .checked_add_signed(Duration::days(
      days
    ))
    .unwrap_or(date)
}

pub fn start_of_week(
  day: NaiveDate,
  week_start: Weekday
) -> NaiveDate {
  let day_idx = day
    .weekday()
    .num_days_from_monday()
    as i64;
  let start_idx = week_start
    .num_days_from_monday()
    as i64;
  let diff =
    (7 + day_idx - start_idx) % 7;
  add_days(day, -diff)
}

pub fn week_days(
  focus: NaiveDate,
  week_start: Weekday
) -> Vec<NaiveDate> {
  let start =
    start_of_week(focus, week_start);
  (0_i64..7_i64)
    .map(|offset| add_days(start, offset))
    .collect()
}

pub fn parse_week_start(
  raw: &str
) -> Option<Weekday> {
  match raw
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

/// Resolves the date argument of the `day`/`week` commands.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_day_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return Ok(add_days(today, 1));
    }
    | "yesterday" => {
      return Ok(add_days(today, -1));
    }
    | _ => {}
  }

  let rel_re = Regex::new(r"^(?P<sign>[+-])(?P<num>\d+)(?P<unit>[dw])$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))?;

  if let Some(caps) =
    rel_re.captures(&lower)
  {
    let num: i64 = caps
      .name("num")
      .map(|m| m.as_str())
      .ok_or_else(|| {
        anyhow!(
          "missing relative amount"
        )
      })?
      .parse()
      .context(
        "invalid relative number"
      )?;
    let days = match caps
      .name("unit")
      .map(|m| m.as_str())
    {
      | Some("w") => num * 7,
      | _ => num
    };
    let negative = caps
      .name("sign")
      .is_some_and(|m| m.as_str() == "-");
    return Ok(add_days(
      today,
      if negative { -days } else { days }
    ));
  }

  if let Ok(date) =
    NaiveDate::parse_from_str(
      token, "%Y-%m-%d"
    )
  {
    return Ok(date);
  }

  Err(anyhow!(
    "unrecognized date expression: \
     {input}"
  ))
  .with_context(|| {
    "supported formats: \
     today/tomorrow/yesterday, \
     +Nd/-Nd, +Nw/-Nw, YYYY-MM-DD"
  })
}
