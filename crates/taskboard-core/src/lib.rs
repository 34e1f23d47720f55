pub mod api;
pub mod app;
pub mod board;
pub mod cli;
pub mod config;
pub mod dnd;
pub mod notify;
pub mod render;
pub mod session;
pub mod task;

use std::ffi::OsString;
use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

use crate::api::HttpApi;
use crate::app::App;
use crate::cli::{
  Command,
  CredentialArgs,
  TopCommand
};
use crate::notify::TerminalNotifier;
use crate::render::Renderer;

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
    "starting taskboard CLI"
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
  );

  let api_url = cli
    .api_url
    .clone()
    .unwrap_or_else(|| cfg.api_url());
  let api = HttpApi::new(&api_url)
    .with_context(|| {
      format!(
        "failed to configure task API \
         at {api_url}"
      )
    })?;

  let notifier =
    Arc::new(TerminalNotifier::new(
      cfg.get_bool("color").unwrap_or(true),
      cfg
        .get_bool("notify.success")
        .unwrap_or(true)
    ));
  let renderer = Renderer::new(&cfg)?;
  let login_defaults = CredentialArgs {
    email:    cli
      .email
      .clone()
      .or_else(|| cfg.get("auth.email")),
    password: cli.password.clone()
  };

  let command = cli.command.unwrap_or(
    TopCommand::Run(Command::Board)
  );

  let runtime =
    tokio::runtime::Builder::new_current_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  runtime.block_on(async move {
    let mut app = App::new(
      Arc::new(api),
      notifier,
      renderer,
      login_defaults
    );
    app.start().await;

    match command {
      | TopCommand::Run(command) => {
        app.execute(command).await
      }
      | TopCommand::Shell => {
        let stdin =
          tokio::io::BufReader::new(
            tokio::io::stdin()
          );
        app
          .run_shell(
            stdin,
            std::io::stdin().is_terminal()
          )
          .await
      }
    }
  })?;

  info!("done");
  Ok(())
}
