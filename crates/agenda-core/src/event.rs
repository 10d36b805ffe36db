use agenda_shared::{AttachmentDto, CalendarEventDto, ParticipantDto};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::datetime::{parse_calendar_date, parse_wall_time};

/// Colour the backend uses to mark events whose detail view must not open.
pub const NO_OPEN_COLOR: &str = "#000000";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("event {id}: invalid {field} date {raw:?}")]
    InvalidDate {
        id: i64,
        field: &'static str,
        raw: String,
    },

    #[error("event {id}: invalid {field} time {raw:?}")]
    InvalidTime {
        id: i64,
        field: &'static str,
        raw: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub email: String,
    pub role: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub id: i64,
    pub url: String,
    pub name: String,
}

/// An event after boundary parsing. Start and end are wall-clock values in
/// the grid timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub id: i64,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub color: Option<String>,
    pub description: String,
    pub location: String,
    pub tag: Option<i64>,
    pub participants: Vec<Participant>,
    pub attachments: Vec<Attachment>,
    pub is_all_day: bool,
    pub is_openable: bool,
}

impl CalendarEvent {
    pub fn from_dto(dto: &CalendarEventDto, timezone: Tz) -> Result<Self, EventError> {
        let start_date = parse_date_field(dto.id, "start", &dto.start_date, timezone)?;
        let end_date = parse_date_field(dto.id, "end", &dto.end_date, timezone)?;
        let start_time = parse_time_field(dto.id, "start", &dto.start_time)?;
        let end_time = parse_time_field(dto.id, "end", &dto.end_time)?;

        // The wire format marks all-day events with 00:00 on both ends.
        let is_all_day = start_time == NaiveTime::MIN && end_time == NaiveTime::MIN;
        let is_openable = dto.color.as_deref().is_none_or(|color| !is_no_open_color(color));

        Ok(Self {
            id: dto.id,
            title: dto.title.clone(),
            start: start_date.and_time(start_time),
            end: end_date.and_time(end_time),
            color: dto.color.clone().filter(|color| !color.trim().is_empty()),
            description: dto.description.clone().unwrap_or_default(),
            location: dto.location.clone().unwrap_or_default(),
            tag: dto.tag_id,
            participants: dto
                .participants
                .iter()
                .map(|p| Participant {
                    email: p.email.clone(),
                    role: p.role.clone(),
                    status: p.status.clone(),
                })
                .collect(),
            attachments: dto
                .attachments
                .iter()
                .map(|a| Attachment {
                    id: a.id,
                    url: a.url.clone(),
                    name: a.name.clone(),
                })
                .collect(),
            is_all_day,
            is_openable,
        })
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date()
    }

    pub fn to_dto(&self) -> CalendarEventDto {
        CalendarEventDto {
            id: self.id,
            title: self.title.clone(),
            start_date: self.start.format("%Y-%m-%d").to_string(),
            end_date: self.end.format("%Y-%m-%d").to_string(),
            start_time: self.start.format("%H:%M").to_string(),
            end_time: self.end.format("%H:%M").to_string(),
            color: self.color.clone(),
            description: Some(self.description.clone()).filter(|d| !d.is_empty()),
            location: Some(self.location.clone()).filter(|l| !l.is_empty()),
            tag_id: self.tag,
            participants: self
                .participants
                .iter()
                .map(|p| ParticipantDto {
                    email: p.email.clone(),
                    role: p.role.clone(),
                    status: p.status.clone(),
                })
                .collect(),
            attachments: self
                .attachments
                .iter()
                .map(|a| AttachmentDto {
                    id: a.id,
                    url: a.url.clone(),
                    name: a.name.clone(),
                })
                .collect(),
        }
    }
}

/// Parses a fetched payload. Events that fail boundary parsing are dropped
/// with a warning so the rest of the grid still renders.
#[tracing::instrument(skip_all, fields(count = dtos.len()))]
pub fn load_events(dtos: &[CalendarEventDto], timezone: Tz) -> Vec<CalendarEvent> {
    let mut events = Vec::with_capacity(dtos.len());
    for dto in dtos {
        match CalendarEvent::from_dto(dto, timezone) {
            Ok(event) => events.push(event),
            Err(err) => warn!(error = %err, "skipping malformed event"),
        }
    }
    debug!(kept = events.len(), "events parsed");
    events
}

pub fn is_no_open_color(color: &str) -> bool {
    color.trim().eq_ignore_ascii_case(NO_OPEN_COLOR)
}

fn parse_date_field(
    id: i64,
    field: &'static str,
    raw: &str,
    timezone: Tz,
) -> Result<NaiveDate, EventError> {
    parse_calendar_date(raw, timezone).ok_or_else(|| EventError::InvalidDate {
        id,
        field,
        raw: raw.to_string(),
    })
}

fn parse_time_field(id: i64, field: &'static str, raw: &str) -> Result<NaiveTime, EventError> {
    // Payloads without times describe whole days.
    if raw.trim().is_empty() {
        return Ok(NaiveTime::MIN);
    }
    parse_wall_time(raw).ok_or_else(|| EventError::InvalidTime {
        id,
        field,
        raw: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use agenda_shared::CalendarEventDto;

    use super::{CalendarEvent, EventError, load_events};

    fn dto(id: i64, start_time: &str, end_time: &str) -> CalendarEventDto {
        CalendarEventDto {
            id,
            title: format!("event {id}"),
            start_date: "2024-06-10".to_string(),
            end_date: "2024-06-10".to_string(),
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            ..CalendarEventDto::default()
        }
    }

    #[test]
    fn midnight_sentinel_becomes_all_day_flag() {
        let event = CalendarEvent::from_dto(&dto(1, "00:00", "00:00"), chrono_tz::Europe::Rome)
            .expect("valid event");
        assert!(event.is_all_day);

        let timed = CalendarEvent::from_dto(&dto(2, "00:00", "01:00"), chrono_tz::Europe::Rome)
            .expect("valid event");
        assert!(!timed.is_all_day);
    }

    #[test]
    fn black_color_is_not_openable() {
        let mut raw = dto(1, "09:00", "10:00");
        raw.color = Some("#000000".to_string());
        let event = CalendarEvent::from_dto(&raw, chrono_tz::Europe::Rome).expect("valid event");
        assert!(!event.is_openable);

        raw.color = Some("#3366FF".to_string());
        let event = CalendarEvent::from_dto(&raw, chrono_tz::Europe::Rome).expect("valid event");
        assert!(event.is_openable);
    }

    #[test]
    fn rejects_unparsable_time() {
        let err = CalendarEvent::from_dto(&dto(9, "9am", "10:00"), chrono_tz::Europe::Rome)
            .expect_err("bad time");
        assert!(matches!(err, EventError::InvalidTime { id: 9, field: "start", .. }));
    }

    #[test]
    fn inverted_ranges_pass_the_boundary() {
        let mut raw = dto(3, "10:00", "09:00");
        raw.end_date = "2024-06-08".to_string();
        let event = CalendarEvent::from_dto(&raw, chrono_tz::Europe::Rome).expect("kept");
        assert!(event.end < event.start);
    }

    #[test]
    fn load_skips_only_bad_events() {
        let mut broken = dto(2, "09:00", "10:00");
        broken.start_date = "not a date".to_string();
        let events = load_events(
            &[dto(1, "09:00", "10:00"), broken, dto(3, "11:00", "12:00")],
            chrono_tz::Europe::Rome,
        );
        let ids = events.iter().map(|e| e.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn dto_conversion_keeps_wire_shape() {
        let mut raw = dto(4, "08:15", "09:45");
        raw.location = Some("Room 2".to_string());
        let event = CalendarEvent::from_dto(&raw, chrono_tz::Europe::Rome).expect("valid event");
        let back = event.to_dto();
        assert_eq!(back.start_time, "08:15");
        assert_eq!(back.end_time, "09:45");
        assert_eq!(back.location.as_deref(), Some("Room 2"));
        assert_eq!(back.start_date, "2024-06-10");
    }
}
