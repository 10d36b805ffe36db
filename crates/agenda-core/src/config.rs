use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::Weekday;
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  info,
  warn
};

use crate::datetime::{
  DEFAULT_TIMEZONE,
  TIMEZONE_ENV_VAR,
  parse_timezone,
  parse_week_start,
  resolve_timezone
};
use crate::grid::GridSettings;
use crate::indicator::IndicatorPolicy;

const CONFIG_ENV_VAR: &str =
  "AGENDA_CONFIG";
const CONFIG_DIR: &str = "agenda";
const CONFIG_FILE: &str = "agenda.toml";

const MAX_GUTTER_PCT: f64 = 50.0;

fn default_row_height_px() -> f64 {
  60.0
}

fn default_gutter_pct() -> f64 {
  crate::layout::DEFAULT_GUTTER_PCT
}

fn default_week_start() -> String {
  "monday".to_string()
}

fn default_tick_seconds() -> u64 {
  1
}

fn default_calendar_name() -> String {
  "agenda".to_string()
}

fn default_color() -> bool {
  true
}

fn default_title_width() -> usize {
  24
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct Config {
  #[serde(default)]
  pub timezone:     Option<String>,
  #[serde(default)]
  pub grid:         GridConfig,
  #[serde(default)]
  pub indicator:    IndicatorConfig,
  #[serde(default)]
  pub ics:          IcsConfig,
  #[serde(default)]
  pub render:       RenderConfig,
  #[serde(skip)]
  pub loaded_files: Vec<PathBuf>
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct GridConfig {
  #[serde(
    default = "default_row_height_px"
  )]
  pub row_height_px: f64,
  #[serde(
    default = "default_gutter_pct"
  )]
  pub gutter_pct:    f64,
  #[serde(
    default = "default_week_start"
  )]
  pub week_start:    String
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct IndicatorConfig {
  #[serde(default)]
  pub policy:       IndicatorPolicy,
  /// Refresh interval of the host's clock tick.
  #[serde(
    default = "default_tick_seconds"
  )]
  pub tick_seconds: u64
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct IcsConfig {
  #[serde(
    default = "default_calendar_name"
  )]
  pub calendar_name: String
}

#[derive(
  Debug,
  Clone,
  PartialEq,
  Serialize,
  Deserialize,
)]
pub struct RenderConfig {
  #[serde(default = "default_color")]
  pub color:       bool,
  /// Widest title shown in a text grid cell, in terminal columns.
  #[serde(
    default = "default_title_width"
  )]
  pub title_width: usize
}

impl Default for Config {
  fn default() -> Self {
    Self {
      timezone:     Some(
        DEFAULT_TIMEZONE.to_string()
      ),
      grid:         GridConfig::default(),
      indicator:
        IndicatorConfig::default(),
      ics:          IcsConfig::default(),
      render:       RenderConfig::default(),
      loaded_files: vec![]
    }
  }
}

impl Default for GridConfig {
  fn default() -> Self {
    Self {
      row_height_px:
        default_row_height_px(),
      gutter_pct: default_gutter_pct(),
      week_start: default_week_start()
    }
  }
}

impl Default for IndicatorConfig {
  fn default() -> Self {
    Self {
      policy:
        IndicatorPolicy::default(),
      tick_seconds:
        default_tick_seconds()
    }
  }
}

impl Default for IcsConfig {
  fn default() -> Self {
    Self {
      calendar_name:
        default_calendar_name()
    }
  }
}

impl Default for RenderConfig {
  fn default() -> Self {
    Self {
      color:       default_color(),
      title_width: default_title_width()
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let path = resolve_config_path(
      config_override
    )?;

    let (mut cfg, file_sets_timezone) =
      match path {
        | Some(path) => {
          info!(config = %path.display(), "loading config");
          let cfg = Self::load_file(&path)?;
          let set = cfg.timezone.is_some();
          (cfg, set)
        }
        | None => {
          warn!(
            "no config file found; \
             using defaults"
          );
          (Self::default(), false)
        }
      };

    if !file_sets_timezone {
      cfg.apply_timezone_env(
        std::env::var(TIMEZONE_ENV_VAR)
          .ok()
          .as_deref()
      );
    }

    cfg.sanitize();
    Ok(cfg)
  }

  /// `$AGENDA_TIMEZONE` stands in for a timezone the config file leaves
  /// unset. `--rc timezone=..` still wins since overrides come later.
  pub fn apply_timezone_env(
    &mut self,
    raw: Option<&str>
  ) {
    let Some(raw) = raw else {
      return;
    };
    if parse_timezone(
      raw,
      TIMEZONE_ENV_VAR
    )
    .is_some()
    {
      self.timezone =
        Some(raw.trim().to_string());
    }
  }

  #[tracing::instrument]
  pub fn load_file(
    path: &Path
  ) -> anyhow::Result<Self> {
    let text =
      fs::read_to_string(path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    let mut cfg = toml::from_str::<Self>(
      &text
    )
    .with_context(|| {
      format!(
        "failed to parse {}",
        path.display()
      )
    })?;

    cfg
      .loaded_files
      .push(path.to_path_buf());
    Ok(cfg)
  }

  /// Applies `key=value` overrides from the command line.
  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) -> anyhow::Result<()>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .trim()
        .to_string();
      let value = v.trim();
      debug!(key = %key, value = %value, "applying override");

      match key.as_str() {
        | "timezone" => {
          self.timezone =
            Some(value.to_string());
        }
        | "grid.row_height_px" => {
          self.grid.row_height_px =
            parse_number(&key, value)?;
        }
        | "grid.gutter_pct" => {
          self.grid.gutter_pct =
            parse_number(&key, value)?;
        }
        | "grid.week_start" => {
          self.grid.week_start =
            value.to_string();
        }
        | "indicator.policy" => {
          self.indicator.policy =
            value.parse()?;
        }
        | "indicator.tick_seconds" => {
          self.indicator.tick_seconds =
            value.parse().with_context(
              || {
                format!(
                  "invalid value for \
                   {key}: {value}"
                )
              }
            )?;
        }
        | "ics.calendar_name" => {
          self.ics.calendar_name =
            value.to_string();
        }
        | "render.color" => {
          self.render.color =
            parse_switch(&key, value)?;
        }
        | "render.title_width" => {
          self.render.title_width =
            value.parse().with_context(
              || {
                format!(
                  "invalid value for \
                   {key}: {value}"
                )
              }
            )?;
        }
        | other => {
          return Err(anyhow!(
            "unknown config key: \
             {other}"
          ));
        }
      }
    }

    self.sanitize();
    Ok(())
  }

  fn sanitize(&mut self) {
    if self
      .timezone
      .as_deref()
      .and_then(|tz| {
        parse_timezone(tz, "config")
      })
      .is_none()
    {
      self.timezone =
        Some(DEFAULT_TIMEZONE.to_string());
    }

    if !self.grid.row_height_px.is_finite()
      || self.grid.row_height_px <= 0.0
    {
      warn!(
        row_height_px = self.grid.row_height_px,
        "invalid row height; using default"
      );
      self.grid.row_height_px =
        default_row_height_px();
    }

    if !self.grid.gutter_pct.is_finite()
    {
      self.grid.gutter_pct =
        default_gutter_pct();
    }
    self.grid.gutter_pct = self
      .grid
      .gutter_pct
      .clamp(0.0, MAX_GUTTER_PCT);

    if parse_week_start(
      &self.grid.week_start
    )
    .is_none()
    {
      warn!(
        week_start = %self.grid.week_start,
        "unknown week start; using monday"
      );
      self.grid.week_start =
        default_week_start();
    }

    if self.indicator.tick_seconds == 0
    {
      self.indicator.tick_seconds =
        default_tick_seconds();
    }

    if self
      .ics
      .calendar_name
      .trim()
      .is_empty()
    {
      self.ics.calendar_name =
        default_calendar_name();
    }

    if self.render.title_width < 4 {
      self.render.title_width =
        default_title_width();
    }
  }

  pub fn week_start(&self) -> Weekday {
    parse_week_start(
      &self.grid.week_start
    )
    .unwrap_or(Weekday::Mon)
  }

  pub fn grid_settings(
    &self
  ) -> GridSettings {
    GridSettings {
      timezone:      resolve_timezone(
        self.timezone.as_deref()
      ),
      row_height_px: self
        .grid
        .row_height_px,
      gutter_pct:    self.grid.gutter_pct,
      week_start:    self.week_start(),
      policy:        self.indicator.policy
    }
  }

  pub fn to_toml(
    &self
  ) -> anyhow::Result<String> {
    toml::to_string_pretty(self)
      .context(
        "failed to serialize config"
      )
  }
}

fn parse_number(
  key: &str,
  value: &str
) -> anyhow::Result<f64> {
  value.parse::<f64>().with_context(
    || {
      format!(
        "invalid value for {key}: \
         {value}"
      )
    }
  )
}

fn parse_switch(
  key: &str,
  value: &str
) -> anyhow::Result<bool> {
  match value
    .to_ascii_lowercase()
    .as_str()
  {
    | "on" | "yes" | "true" | "1" => {
      Ok(true)
    }
    | "off" | "no" | "false" | "0" => {
      Ok(false)
    }
    | other => Err(anyhow!(
      "invalid value for {key}: \
       {other}"
    ))
  }
}

#[tracing::instrument]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(raw) =
    std::env::var(CONFIG_ENV_VAR)
  {
    let trimmed = raw.trim();
    if trimmed == "/dev/null" {
      return Ok(None);
    }
    if !trimmed.is_empty() {
      return Ok(Some(PathBuf::from(
        trimmed
      )));
    }
  }

  let Some(config_dir) =
    dirs::config_dir()
  else {
    debug!(
      "cannot determine config \
       directory"
    );
    return Ok(None);
  };
  let candidate = config_dir
    .join(CONFIG_DIR)
    .join(CONFIG_FILE);
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}
