//! Minimal iCalendar import and export.
//!
//! Export writes one fixed Europe/Rome VTIMEZONE and one VEVENT per event.
//! Import is line oriented: it only looks at VEVENT blocks and a handful of
//! keys, slicing date values positionally.

use std::borrow::Cow;
use std::io::BufReader;

use agenda_shared::CalendarEventDto;
use chrono::{
  DateTime,
  Utc
};
use ical::PropertyParser;
use ical::property::Property;
use ics::components::Parameter;
use ics::properties::{
  Attendee,
  Description,
  DtEnd,
  DtStart,
  Location,
  RRule,
  Summary,
  TzName
};
use ics::{
  Daylight,
  ICalendar,
  Standard,
  TimeZone,
  escape_text
};
use serde::Serialize;
use tracing::{
  debug,
  trace
};

use crate::event::{
  CalendarEvent,
  Participant
};

pub const ICS_MIME: &str =
  "text/calendar; charset=utf-8";
pub const ICS_EXTENSION: &str = "ics";
pub const ICS_TZID: &str = "Europe/Rome";

const PRODID_SUFFIX: &str =
  "//agenda//calendar//EN";

/// Form prefill recovered from one VEVENT block.
#[derive(
  Debug,
  Clone,
  Default,
  PartialEq,
  Eq,
  Serialize,
)]
pub struct IcsPrefill {
  pub title:       String,
  pub description: String,
  pub location:    String,
  pub start_date:  Option<String>,
  pub start_time:  Option<String>,
  pub end_date:    Option<String>,
  pub end_time:    Option<String>,
  pub timezone:    Option<String>
}

impl IcsPrefill {
  /// Turns the prefill into the payload shape a new-event form submits.
  pub fn into_dto(
    self,
    id: i64
  ) -> CalendarEventDto {
    CalendarEventDto {
      id,
      title: self.title,
      start_date: self
        .start_date
        .unwrap_or_default(),
      end_date: self
        .end_date
        .unwrap_or_default(),
      start_time: self
        .start_time
        .unwrap_or_default(),
      end_time: self
        .end_time
        .unwrap_or_default(),
      description: Some(self.description)
        .filter(|d| !d.is_empty()),
      location: Some(self.location)
        .filter(|l| !l.is_empty()),
      ..CalendarEventDto::default()
    }
  }
}

fn rome_calendar<'a>(
  name: &str
) -> ICalendar<'a> {
  let mut cet_standard = Standard::new(
    "19701025T030000",
    "+0200",
    "+0100"
  );
  cet_standard.push(TzName::new("CET"));
  cet_standard.push(RRule::new(
    "FREQ=YEARLY;BYMONTH=10;BYDAY=-1SU"
  ));

  let mut cest_daylight = Daylight::new(
    "19700329T020000",
    "+0100",
    "+0200"
  );
  cest_daylight
    .push(TzName::new("CEST"));
  cest_daylight.push(RRule::new(
    "FREQ=YEARLY;BYMONTH=3;BYDAY=-1SU"
  ));

  let mut timezone = TimeZone::daylight(
    ICS_TZID,
    cest_daylight
  );
  timezone.add_standard(cet_standard);

  let mut calendar = ICalendar::new(
    Cow::Borrowed("2.0"),
    Cow::Owned(format!(
      "-//{name}{PRODID_SUFFIX}"
    ))
  );
  calendar.add_timezone(timezone);
  calendar
}

/// Serializes `events` into an iCalendar document.
#[tracing::instrument(skip(events, now), fields(count = events.len()))]
pub fn export_calendar(
  events: &[CalendarEvent],
  name: &str,
  now: DateTime<Utc>
) -> String {
  let stamp = now
    .format("%Y%m%dT%H%M%SZ")
    .to_string();
  let mut calendar = rome_calendar(name);

  for event in events {
    calendar
      .add_event(to_vevent(event, &stamp));
  }

  debug!("calendar exported");
  calendar.to_string()
}

fn to_vevent<'a>(
  event: &'a CalendarEvent,
  stamp: &str
) -> ics::Event<'a> {
  let mut vevent = ics::Event::new(
    format!("agenda-event-{}", event.id),
    stamp.to_string()
  );

  let mut start = DtStart::new(
    event
      .start
      .format("%Y%m%dT%H%M%S")
      .to_string()
  );
  start.add(Parameter::new(
    "TZID", ICS_TZID
  ));
  vevent.push(start);

  let mut end = DtEnd::new(
    event
      .end
      .format("%Y%m%dT%H%M%S")
      .to_string()
  );
  end.add(Parameter::new(
    "TZID", ICS_TZID
  ));
  vevent.push(end);

  vevent.push(Summary::new(escape_text(
    event.title.as_str()
  )));

  if !event.description.is_empty() {
    vevent.push(Description::new(
      escape_text(
        event.description.as_str()
      )
    ));
  }

  if !event.location.is_empty() {
    vevent.push(Location::new(
      escape_text(
        event.location.as_str()
      )
    ));
  }

  for participant in &event.participants
  {
    vevent
      .push(to_attendee(participant));
  }

  vevent
}

fn to_attendee<'a>(
  participant: &'a Participant
) -> Attendee<'a> {
  let mut attendee = Attendee::new(
    format!(
      "mailto:{}",
      participant.email
    )
  );
  attendee.add(Parameter::new(
    "ROLE",
    attendee_role(
      participant.role.as_deref()
    )
  ));
  attendee.add(Parameter::new(
    "PARTSTAT",
    attendee_status(
      participant.status.as_deref()
    )
  ));
  attendee
}

fn attendee_role(
  role: Option<&str>
) -> &'static str {
  match role
    .map(|r| r.trim().to_ascii_lowercase())
    .as_deref()
  {
    | Some(
      "owner" | "organizer" | "chair"
    ) => "CHAIR",
    | Some("optional") => {
      "OPT-PARTICIPANT"
    }
    | _ => "REQ-PARTICIPANT"
  }
}

fn attendee_status(
  status: Option<&str>
) -> &'static str {
  match status
    .map(|s| s.trim().to_ascii_lowercase())
    .as_deref()
  {
    | Some("accepted") => "ACCEPTED",
    | Some("declined") => "DECLINED",
    | Some("tentative") => "TENTATIVE",
    | _ => "NEEDS-ACTION"
  }
}

/// Parses VEVENT blocks into form prefills. Unknown keys and malformed lines
/// are skipped.
#[tracing::instrument(skip_all, fields(bytes = text.len()))]
pub fn import_calendar(
  text: &str
) -> Vec<IcsPrefill> {
  let normalized =
    text.replace("\r\n", "\n");
  let parser = PropertyParser::from_reader(
    BufReader::new(normalized.as_bytes())
  );

  let mut prefills = Vec::new();
  let mut current: Option<IcsPrefill> =
    None;

  for property in parser {
    let property = match property {
      | Ok(property) => property,
      | Err(err) => {
        trace!(error = %err, "skipping malformed ics line");
        continue;
      }
    };

    let name =
      property.name.to_ascii_uppercase();
    let value = property
      .value
      .as_deref()
      .unwrap_or_default()
      .trim();

    match name.as_str() {
      | "BEGIN"
        if value
          .eq_ignore_ascii_case(
            "VEVENT"
          ) =>
      {
        current =
          Some(IcsPrefill::default());
      }
      | "END"
        if value
          .eq_ignore_ascii_case(
            "VEVENT"
          ) =>
      {
        if let Some(prefill) =
          current.take()
        {
          prefills.push(prefill);
        }
      }
      | _ => {
        if let Some(prefill) =
          current.as_mut()
        {
          apply_property(
            prefill, &name, &property,
            value
          );
        }
      }
    }
  }

  debug!(
    events = prefills.len(),
    "calendar imported"
  );
  prefills
}

fn apply_property(
  prefill: &mut IcsPrefill,
  name: &str,
  property: &Property,
  value: &str
) {
  match name {
    | "SUMMARY" => {
      prefill.title = unescape_text(value);
    }
    | "DESCRIPTION" => {
      prefill.description =
        unescape_text(value);
    }
    | "LOCATION" => {
      prefill.location =
        unescape_text(value);
    }
    | "DTSTART" => {
      let (date, time) =
        slice_date_time(value);
      prefill.start_date = date;
      prefill.start_time = time;
      if let Some(tzid) =
        tzid_param(property)
      {
        prefill.timezone = Some(tzid);
      }
    }
    | "DTEND" => {
      let (date, time) =
        slice_date_time(value);
      prefill.end_date = date;
      prefill.end_time = time;
    }
    | other => {
      trace!(key = other, "ignoring ics key");
    }
  }
}

/// `YYYYMMDDTHHMMSS` → (`YYYY-MM-DD`, `HH:MM`). Date-only values map to
/// midnight.
fn slice_date_time(
  value: &str
) -> (Option<String>, Option<String>) {
  let date = match (
    value.get(0..4),
    value.get(4..6),
    value.get(6..8)
  ) {
    | (Some(y), Some(m), Some(d)) => {
      Some(format!("{y}-{m}-{d}"))
    }
    | _ => None
  };

  let time = match (
    value.get(9..11),
    value.get(11..13)
  ) {
    | (Some(h), Some(m)) => {
      Some(format!("{h}:{m}"))
    }
    | _ if date.is_some() => {
      Some("00:00".to_string())
    }
    | _ => None
  };

  (date, time)
}

fn tzid_param(
  property: &Property
) -> Option<String> {
  property
    .params
    .as_ref()?
    .iter()
    .find(|(key, _)| {
      key.eq_ignore_ascii_case("TZID")
    })
    .and_then(|(_, values)| {
      values.first().cloned()
    })
}

fn unescape_text(value: &str) -> String {
  let mut out =
    String::with_capacity(value.len());
  let mut chars = value.chars();
  while let Some(ch) = chars.next() {
    if ch != '\\' {
      out.push(ch);
      continue;
    }
    match chars.next() {
      | Some('n' | 'N') => out.push('\n'),
      | Some(other) => out.push(other),
      | None => out.push('\\')
    }
  }
  out
}
