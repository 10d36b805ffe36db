use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use agenda_shared::CalendarEventDto;
use anyhow::Context;
use tracing::{debug, info, instrument, warn};

use crate::cli::{Command, ExportArgs, ImportArgs, NowArgs, ViewArgs};
use crate::config::Config;
use crate::datetime::{parse_day_expr, today_in};
use crate::event::{CalendarEvent, load_events};
use crate::feed::EventFeed;
use crate::grid::{build_day_view, build_week_view};
use crate::ics::{ICS_EXTENSION, ICS_MIME, export_calendar, import_calendar};
use crate::indicator::{Clock, CurrentTimeLine, ViewMode, current_time_line};
use crate::render::Renderer;

#[instrument(skip_all)]
pub fn dispatch(
    cfg: &Config,
    renderer: &Renderer,
    feed: &mut EventFeed,
    clock: &dyn Clock,
    command: Command,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Day(args) => cmd_view(cfg, renderer, feed, clock, ViewMode::Day, args),
        Command::Week(args) => cmd_view(cfg, renderer, feed, clock, ViewMode::Week, args),
        Command::Now(args) => cmd_now(cfg, renderer, clock, args),
        Command::Export(args) => cmd_export(cfg, renderer, clock, args),
        Command::Import(args) => cmd_import(renderer, args),
        Command::Config => cmd_config(cfg, renderer),
    }
}

/// Reads a JSON array of events and converts it at the boundary.
#[instrument(skip(cfg))]
pub fn read_events_file(cfg: &Config, path: &Path) -> anyhow::Result<Vec<CalendarEvent>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read events from {}", path.display()))?;
    let dtos: Vec<CalendarEventDto> = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse events from {}", path.display()))?;

    let events = load_events(&dtos, cfg.grid_settings().timezone);
    info!(read = dtos.len(), kept = events.len(), "events loaded");
    Ok(events)
}

#[instrument(skip(cfg, renderer, feed, clock, args))]
fn cmd_view(
    cfg: &Config,
    renderer: &Renderer,
    feed: &mut EventFeed,
    clock: &dyn Clock,
    mode: ViewMode,
    args: ViewArgs,
) -> anyhow::Result<()> {
    let settings = cfg.grid_settings();
    let now = clock.now();
    let today = today_in(settings.timezone, now);
    let focus = parse_day_expr(&args.date, today)?;

    feed.publish(read_events_file(cfg, &args.events)?);
    let events = feed.snapshot();

    let view = match mode {
        ViewMode::Day => build_day_view(&events, focus, &settings, now),
        ViewMode::Week => build_week_view(&events, focus, &settings, now),
    };

    if args.json {
        renderer.print_json(&view)
    } else {
        renderer.print_grid(&view, &events)
    }
}

#[instrument(skip(cfg, renderer, clock))]
fn cmd_now(
    cfg: &Config,
    renderer: &Renderer,
    clock: &dyn Clock,
    args: NowArgs,
) -> anyhow::Result<()> {
    let ticks = if args.watch { args.count } else { Some(1) };
    watch_now_line(
        cfg,
        clock,
        ticks,
        |line| renderer.print_now_line(line),
        thread::sleep,
    )
}

/// Emits today's current-time line every `indicator.tick_seconds`.
///
/// `ticks = None` keeps going until `emit` fails.
pub fn watch_now_line<E, S>(
    cfg: &Config,
    clock: &dyn Clock,
    ticks: Option<u32>,
    mut emit: E,
    mut sleep: S,
) -> anyhow::Result<()>
where
    E: FnMut(&CurrentTimeLine) -> anyhow::Result<()>,
    S: FnMut(Duration),
{
    let settings = cfg.grid_settings();
    let interval = Duration::from_secs(cfg.indicator.tick_seconds);
    let mut emitted: u32 = 0;

    loop {
        let now = clock.now();
        let today = today_in(settings.timezone, now);
        let line = current_time_line(
            now,
            settings.timezone,
            &[today],
            ViewMode::Day,
            settings.policy,
            settings.row_height_px,
        );
        emit(&line)?;
        emitted = emitted.saturating_add(1);

        if ticks.is_some_and(|limit| emitted >= limit) {
            return Ok(());
        }
        debug!(?interval, emitted, "waiting for next tick");
        sleep(interval);
    }
}

/// Forces the `.ics` extension onto an export path.
fn ics_output_path(path: PathBuf) -> PathBuf {
    let has_ics_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(ICS_EXTENSION));
    if has_ics_extension {
        return path;
    }

    let fixed = path.with_extension(ICS_EXTENSION);
    warn!(
        requested = %path.display(),
        path = %fixed.display(),
        "export path lacks .ics extension; using corrected path"
    );
    fixed
}

#[instrument(skip(cfg, renderer, clock, args))]
fn cmd_export(
    cfg: &Config,
    renderer: &Renderer,
    clock: &dyn Clock,
    args: ExportArgs,
) -> anyhow::Result<()> {
    let events = read_events_file(cfg, &args.events)?;
    let name = args
        .name
        .unwrap_or_else(|| cfg.ics.calendar_name.clone());
    let document = export_calendar(&events, &name, clock.now());

    match args.out {
        Some(path) => {
            let path = ics_output_path(path);
            fs::write(&path, document)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(
                path = %path.display(),
                mime = ICS_MIME,
                events = events.len(),
                "calendar written"
            );
            Ok(())
        }
        None => renderer.print_text(&document),
    }
}

#[instrument(skip(renderer, args))]
fn cmd_import(renderer: &Renderer, args: ImportArgs) -> anyhow::Result<()> {
    let text = fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let prefills = import_calendar(&text);

    if args.json {
        renderer.print_json(&prefills)
    } else {
        renderer.print_prefills(&prefills)
    }
}

fn cmd_config(cfg: &Config, renderer: &Renderer) -> anyhow::Result<()> {
    for path in &cfg.loaded_files {
        debug!(config = %path.display(), "effective config loaded from file");
    }
    renderer.print_text(&cfg.to_toml()?)
}
