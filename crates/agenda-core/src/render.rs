use std::io::{self, IsTerminal, Write};

use serde::Serialize;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config::Config;
use crate::event::CalendarEvent;
use crate::grid::{GridView, Placement};
use crate::ics::IcsPrefill;
use crate::indicator::{CurrentTimeLine, LineSpan};
use crate::resolve::DayKind;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    row_height_px: f64,
    title_width: usize,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.render.color,
            row_height_px: cfg.grid.row_height_px,
            title_width: cfg.render.title_width,
        }
    }

    #[tracing::instrument(skip(self, view, events))]
    pub fn print_grid(&self, view: &GridView, events: &[CalendarEvent]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_grid(&mut out, view, events)
    }

    pub fn write_grid<W: Write>(
        &self,
        mut writer: W,
        view: &GridView,
        events: &[CalendarEvent],
    ) -> anyhow::Result<()> {
        let mut headers = vec!["Hour".to_string()];
        headers.extend(
            view.days
                .iter()
                .map(|column| column.date.format("%a %Y-%m-%d").to_string()),
        );

        let mut rows = Vec::with_capacity(view.days.len() + 1);

        if view.days.iter().any(|column| !column.all_day.is_empty()) {
            let mut row = vec!["all-day".to_string()];
            for column in &view.days {
                let titles = column
                    .all_day
                    .iter()
                    .filter_map(|id| events.iter().find(|event| event.id == *id))
                    .map(|event| fit_width(&event.title, self.title_width))
                    .collect::<Vec<_>>();
                row.push(titles.join(" | "));
            }
            rows.push(row);
        }

        let now_hour = self.now_hour(&view.now_line);
        let hour_count = view.days.first().map(|column| column.hours.len()).unwrap_or(0);

        for hour in 0..hour_count {
            let mut label = format!("{hour:02}:00");
            if now_hour == Some(hour) {
                label = self.paint(&format!("{label} now"), "31");
            }

            let mut row = vec![label];
            for column in &view.days {
                let cell = column
                    .hours
                    .get(hour)
                    .map(|cell| {
                        cell.placements
                            .iter()
                            .map(|placement| self.placement_text(placement))
                            .collect::<Vec<_>>()
                            .join(" | ")
                    })
                    .unwrap_or_default();
                row.push(cell);
            }
            rows.push(row);
        }

        write_table(&mut writer, headers, rows)?;

        if view.now_line.visible {
            writeln!(writer)?;
            self.write_now_line(&mut writer, &view.now_line)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self, line))]
    pub fn print_now_line(&self, line: &CurrentTimeLine) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_now_line(&mut out, line)
    }

    fn write_now_line<W: Write>(&self, mut writer: W, line: &CurrentTimeLine) -> anyhow::Result<()> {
        let span = match line.span {
            LineSpan::Column(idx) => format!("column {}", idx + 1),
            LineSpan::FullWidth => "full width".to_string(),
        };
        let state = if line.visible { "visible" } else { "hidden" };
        writeln!(
            writer,
            "now {}  offset {:.1}px  {}  {}",
            self.paint(&line.label, "31"),
            line.offset_px,
            span,
            state
        )?;
        Ok(())
    }

    #[tracing::instrument(skip(self, prefills))]
    pub fn print_prefills(&self, prefills: &[IcsPrefill]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_prefills(&mut out, prefills)
    }

    pub fn write_prefills<W: Write>(&self, writer: W, prefills: &[IcsPrefill]) -> anyhow::Result<()> {
        let headers = vec![
            "Title".to_string(),
            "Start".to_string(),
            "End".to_string(),
            "Location".to_string(),
            "TZ".to_string(),
        ];

        let rows = prefills
            .iter()
            .map(|prefill| {
                vec![
                    self.paint(&fit_width(&prefill.title, self.title_width), "33"),
                    join_date_time(prefill.start_date.as_deref(), prefill.start_time.as_deref()),
                    join_date_time(prefill.end_date.as_deref(), prefill.end_time.as_deref()),
                    fit_width(&prefill.location, self.title_width),
                    prefill.timezone.clone().unwrap_or_default(),
                ]
            })
            .collect();

        write_table(writer, headers, rows)
    }

    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, value)?;
        writeln!(out)?;
        Ok(())
    }

    pub fn print_text(&self, text: &str) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        write!(out, "{text}")?;
        if !text.ends_with('\n') {
            writeln!(out)?;
        }
        Ok(())
    }

    fn placement_text(&self, placement: &Placement) -> String {
        let title = fit_width(&placement.title, self.title_width);
        let title = match placement.kind {
            DayKind::SingleDay => title,
            DayKind::FirstDay => format!("{title} >"),
            DayKind::MiddleDay => format!("< {title} >"),
            DayKind::LastDay => format!("< {title}"),
        };
        let text = format!("{title} ({}h)", format_hours(placement.duration_hours));
        if placement.openable {
            self.paint(&text, "36")
        } else {
            self.paint(&text, "2")
        }
    }

    fn now_hour(&self, line: &CurrentTimeLine) -> Option<usize> {
        if !line.visible || self.row_height_px <= 0.0 {
            return None;
        }
        Some((line.offset_px / self.row_height_px).floor() as usize)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn join_date_time(date: Option<&str>, time: Option<&str>) -> String {
    match (date, time) {
        (Some(date), Some(time)) => format!("{date} {time}"),
        (Some(date), None) => date.to_string(),
        _ => String::new(),
    }
}

fn format_hours(hours: f64) -> String {
    let text = format!("{hours:.2}");
    let trimmed = text.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Truncates `text` to `max` terminal columns, marking the cut with `…`.
fn fit_width(text: &str, max: usize) -> String {
    if UnicodeWidthStr::width(text) <= max {
        return text.to_string();
    }

    let budget = max.saturating_sub(1);
    let mut used = 0;
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        let width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if used + width > budget {
            break;
        }
        used += width;
        out.push(ch);
    }
    out.push('…');
    out
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, width) in headers.iter().zip(&widths) {
        write!(writer, "{:width$} ", header, width = *width)?;
    }
    writeln!(writer)?;

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, width) in widths.iter().enumerate() {
            let cell = row.get(idx).map(String::as_str).unwrap_or("");
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
