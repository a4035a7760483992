pub mod cli;
pub mod commands;
pub mod config;
pub mod dates;
pub mod datetime;
pub mod grid;
pub mod page;
pub mod render;
pub mod route;
pub mod title;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
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
    "starting calgrid"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.calendarrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .iter()
        .map(|kv| {
          (kv.key.clone(), kv.value.clone())
        })
    )
  );

  let settings =
    config::CalendarSettings::from_config(
      &cfg
    )
    .context(
      "failed to resolve calendar \
       settings"
    )?;

  let zone = datetime::resolve_zone(
    settings.timezone.as_deref()
  );
  let renderer =
    render::Renderer::new(&settings);

  commands::dispatch(
    &cli, &cfg, &settings, &renderer,
    zone
  )?;

  info!("done");
  Ok(())
}
