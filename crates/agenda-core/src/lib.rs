pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod event;
pub mod feed;
pub mod grid;
pub mod ics;
pub mod index;
pub mod indicator;
pub mod layout;
pub mod render;
pub mod resolve;

use std::ffi::OsString;

use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting agenda CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  )?;

  let renderer =
    render::Renderer::new(&cfg);

  let mut feed = feed::EventFeed::new();
  let subscription =
    feed.subscribe(|events| {
      debug!(
        events = events.len(),
        "event snapshot received"
      );
    });
  feed.open();

  let result = commands::dispatch(
    &cfg,
    &renderer,
    &mut feed,
    &indicator::SystemClock,
    cli.command
  );

  feed.close();
  feed.unsubscribe(subscription);
  result?;

  info!("done");
  Ok(())
}
