use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use chrono::NaiveDate;
use tracing::debug;

use crate::datetime::add_days;
use crate::event::CalendarEvent;

/// Date → events overlapping that date, restricted to a visible window.
///
/// Built once per event snapshot so per-cell lookups do not rescan the whole
/// list. Stored values are indices into the snapshot, in snapshot order.
#[derive(Debug, Clone, Default)]
pub struct DayIndex {
    days: BTreeMap<NaiveDate, Vec<usize>>,
}

impl DayIndex {
    #[tracing::instrument(skip(events), fields(events = events.len()))]
    pub fn build(events: &[CalendarEvent], window: RangeInclusive<NaiveDate>) -> Self {
        let mut days: BTreeMap<NaiveDate, Vec<usize>> = BTreeMap::new();
        let (first, last) = (*window.start(), *window.end());

        for (idx, event) in events.iter().enumerate() {
            // Inverted ranges cover their start date only.
            let start = event.start_date();
            let end = event.end_date().max(start);

            let mut day = start.max(first);
            let stop = end.min(last);
            while day <= stop {
                days.entry(day).or_default().push(idx);
                let next = add_days(day, 1);
                if next == day {
                    break;
                }
                day = next;
            }
        }

        debug!(days = days.len(), "day index built");
        Self { days }
    }

    pub fn indices_on(&self, day: NaiveDate) -> &[usize] {
        self.days.get(&day).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn events_on<'a>(
        &'a self,
        events: &'a [CalendarEvent],
        day: NaiveDate,
    ) -> impl Iterator<Item = &'a CalendarEvent> + 'a {
        self.indices_on(day)
            .iter()
            .filter_map(move |idx| events.get(*idx))
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}
