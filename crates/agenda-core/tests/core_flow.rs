use std::fs;

use agenda_core::config::Config;
use agenda_core::event::load_events;
use agenda_core::feed::EventFeed;
use agenda_core::grid::{build_day_view, build_week_view};
use agenda_core::ics::{export_calendar, import_calendar};
use agenda_core::indicator::{Clock, FixedClock, LineSpan};
use agenda_core::resolve::DayKind;
use agenda_shared::CalendarEventDto;
use chrono::{NaiveDate, TimeZone, Utc};
use tempfile::tempdir;

const EVENTS_JSON: &str = r##"[
  {"id": 1, "title": "Planning", "startDate": "2024-06-10", "endDate": "2024-06-10",
   "startTime": "09:00", "endTime": "11:30", "color": "#3366ff", "location": "Room 4"},
  {"id": 2, "title": "Review", "startDate": "2024-06-10", "endDate": "2024-06-10",
   "startTime": "09:15", "endTime": "10:00"},
  {"id": 3, "title": "Night deploy", "startDate": "2024-06-11", "endDate": "2024-06-13",
   "startTime": "22:00", "endTime": "02:00"},
  {"id": 4, "title": "Holiday", "startDate": "2024-06-14", "endDate": "2024-06-14",
   "startTime": "00:00", "endTime": "00:00"},
  {"id": 5, "title": "Locked", "startDate": "2024-06-12", "endDate": "2024-06-12",
   "startTime": "15:00", "endTime": "16:00", "color": "#000000"},
  {"id": 6, "title": "Broken", "startDate": "June 12", "endDate": "2024-06-12",
   "startTime": "15:00", "endTime": "16:00"}
]"##;

fn date(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("valid date")
}

fn dtos() -> Vec<CalendarEventDto> {
    serde_json::from_str(EVENTS_JSON).expect("events json")
}

#[test]
fn json_events_flow_into_week_grid() {
    let cfg = Config::default();
    let settings = cfg.grid_settings();
    let events = load_events(&dtos(), settings.timezone);
    assert_eq!(events.len(), 5);

    // Wednesday 2024-06-12 10:30 in Rome.
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 6, 12, 8, 30, 0).single().expect("now"));
    let view = build_week_view(&events, date("2024-06-12"), &settings, clock.now());

    assert_eq!(view.days.len(), 7);
    assert_eq!(view.days[0].date, date("2024-06-10"));

    let monday_nine = &view.days[0].hours[9].placements;
    assert_eq!(monday_nine.len(), 2);
    assert_eq!(monday_nine[0].duration_hours, 2.5);
    assert_eq!(monday_nine[1].top_offset_px, 15.0);
    assert!(monday_nine[1].left_pct > monday_nine[0].left_pct);

    let deploy = view
        .days
        .iter()
        .flat_map(|column| column.placements())
        .filter(|p| p.event_id == 3)
        .map(|p| (p.kind, p.duration_hours))
        .collect::<Vec<_>>();
    assert_eq!(
        deploy,
        vec![
            (DayKind::FirstDay, 2.0),
            (DayKind::MiddleDay, 24.0),
            (DayKind::LastDay, 2.0),
        ]
    );

    let locked = view.days[2].hours[15]
        .placements
        .iter()
        .find(|p| p.event_id == 5)
        .expect("locked event placed");
    assert!(!locked.openable);

    assert_eq!(view.days[4].all_day, vec![4]);

    assert!(view.now_line.visible);
    assert_eq!(view.now_line.span, LineSpan::Column(2));
    assert_eq!(view.now_line.offset_px, 630.0);
}

#[test]
fn feed_snapshot_drives_the_day_view() {
    let cfg = Config::default();
    let settings = cfg.grid_settings();

    let mut feed = EventFeed::new();
    feed.open();
    feed.publish(load_events(&dtos(), settings.timezone));

    let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).single().expect("now");
    let snapshot = feed.snapshot();
    let view = build_day_view(&snapshot, date("2024-06-10"), &settings, now);

    assert_eq!(view.days[0].placements().count(), 2);
    assert!(!view.now_line.visible);
}

#[test]
fn ics_file_round_trip() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("agenda.ics");

    let cfg = Config::default();
    let events = load_events(&dtos(), cfg.grid_settings().timezone);
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).single().expect("now");
    fs::write(&path, export_calendar(&events, &cfg.ics.calendar_name, now)).expect("write ics");

    let text = fs::read_to_string(&path).expect("read ics");
    let prefills = import_calendar(&text);
    assert_eq!(prefills.len(), events.len());

    let planning = prefills
        .iter()
        .find(|p| p.title == "Planning")
        .expect("planning imported");
    assert_eq!(planning.location, "Room 4");
    assert_eq!(planning.start_date.as_deref(), Some("2024-06-10"));
    assert_eq!(planning.end_time.as_deref(), Some("11:30"));

    let dto = planning.clone().into_dto(0);
    let reloaded = load_events(&[dto], cfg.grid_settings().timezone);
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded[0].start, events[0].start);
    assert_eq!(reloaded[0].end, events[0].end);
}

#[test]
fn config_file_changes_grid_geometry() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("agenda.toml");
    fs::write(&path, "[grid]\nrow_height_px = 40\ngutter_pct = 0\n").expect("write config");

    let cfg = Config::load(Some(&path)).expect("load config");
    let settings = cfg.grid_settings();
    let events = load_events(&dtos(), settings.timezone);
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).single().expect("now");
    let view = build_day_view(&events, date("2024-06-10"), &settings, now);

    let nine = &view.days[0].hours[9].placements;
    assert_eq!(nine[0].height_px, 100.0);
    assert_eq!(nine[1].left_pct, 50.0);
}
