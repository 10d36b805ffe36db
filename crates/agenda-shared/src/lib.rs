//! Wire shapes exchanged with the backend's calendar endpoints.
//!
//! These mirror the JSON payload as it is sent: dates and times are plain
//! strings and most fields are optional. Nothing here is validated; the core
//! crate parses these into strict values before layout.

use serde::{
  Deserialize,
  Serialize
};

#[derive(
  Debug,
  Clone,
  Default,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEventDto {
  pub id:           i64,
  #[serde(default)]
  pub title:        String,
  pub start_date:   String,
  pub end_date:     String,
  #[serde(default)]
  pub start_time:   String,
  #[serde(default)]
  pub end_time:     String,
  #[serde(default)]
  pub color:        Option<String>,
  #[serde(default)]
  pub description:  Option<String>,
  #[serde(default)]
  pub location:     Option<String>,
  #[serde(default)]
  pub tag_id:       Option<i64>,
  #[serde(default)]
  pub participants: Vec<ParticipantDto>,
  #[serde(default)]
  pub attachments:  Vec<AttachmentDto>
}

#[derive(
  Debug,
  Clone,
  Default,
  Serialize,
  Deserialize,
  PartialEq,
)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
  pub email:  String,
  #[serde(default)]
  pub role:   Option<String>,
  #[serde(default)]
  pub status: Option<String>
}

#[derive(
  Debug,
  Clone,
  Default,
  Serialize,
  Deserialize,
  PartialEq,
)]
pub struct AttachmentDto {
  pub id:   i64,
  pub url:  String,
  #[serde(default)]
  pub name: String
}

#[cfg(test)]
mod tests {
  use super::CalendarEventDto;

  #[test]
  fn decodes_backend_payload() {
    let raw = r##"{
      "id": 7,
      "title": "Kickoff",
      "startDate": "2024-06-10",
      "endDate": "2024-06-10",
      "startTime": "09:00",
      "endTime": "11:30",
      "color": "#3366ff",
      "tagId": 3,
      "participants": [
        { "email": "a@example.com", "role": "owner", "status": "accepted" }
      ]
    }"##;

    let dto: CalendarEventDto =
      serde_json::from_str(raw)
        .expect("decode event");
    assert_eq!(dto.id, 7);
    assert_eq!(dto.start_time, "09:00");
    assert_eq!(dto.tag_id, Some(3));
    assert_eq!(dto.participants.len(), 1);
    assert!(dto.attachments.is_empty());
    assert!(dto.location.is_none());
  }

  #[test]
  fn missing_times_default_to_empty() {
    let raw = r#"{"id":1,"startDate":"2024-01-01","endDate":"2024-01-02"}"#;
    let dto: CalendarEventDto =
      serde_json::from_str(raw)
        .expect("decode event");
    assert!(dto.start_time.is_empty());
    assert!(dto.title.is_empty());
  }
}
