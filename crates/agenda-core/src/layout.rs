use serde::Serialize;

pub const DEFAULT_GUTTER_PCT: f64 = 2.0;

/// Horizontal slot of one event inside an hour row, in percent of the
/// column width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColumnSlot {
    pub event_id: i64,
    pub width_pct: f64,
    pub left_pct: f64,
}

/// Tiles the events anchored to one hour row side by side.
///
/// Slots follow input order; there is no overlap analysis, each row is laid
/// out on its own, so an event may get different widths in different rows.
pub fn layout_row(event_ids: &[i64], gutter_pct: f64) -> Vec<ColumnSlot> {
    if event_ids.is_empty() {
        return Vec::new();
    }

    let width = 100.0 / event_ids.len() as f64;
    event_ids
        .iter()
        .enumerate()
        .map(|(index, id)| ColumnSlot {
            event_id: *id,
            width_pct: width,
            left_pct: index as f64 * (width + gutter_pct),
        })
        .collect()
}
