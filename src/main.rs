mod app;
mod cache;
mod cli;
mod commands;
mod config;
mod escrow;
mod event;
mod http;
mod logging;
mod query;
mod services;
mod support_desk;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

use crate::escrow::WorkspaceScope;
use crate::logging::LogTarget;

#[derive(Parser, Debug)]
#[command(name = "agency-desk")]
#[command(about = "Support desk and escrow ledger for the agency platform")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/agency-desk/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Workspace slug or numeric id
  #[arg(short, long)]
  workspace: Option<String>,

  /// Act as this user instead of the configured one
  #[arg(short, long)]
  user: Option<String>,

  /// Run one operation and exit instead of opening the TUI
  #[command(subcommand)]
  command: Option<cli::Command>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let mut config = config::Config::load(args.config.as_deref())?;
  if let Some(workspace) = args.workspace {
    let scope = WorkspaceScope::from_arg(&workspace);
    config.workspace.id = scope.workspace_id;
    config.workspace.slug = scope.workspace_slug;
  }
  if let Some(user) = args.user {
    config.session.user_id = user;
  }

  match args.command {
    Some(command) => {
      let _guard = logging::init(LogTarget::Stderr)?;
      let services = services::Services::from_config(&config)?;
      cli::run(command, services).await
    }
    None => {
      let _guard = logging::init(LogTarget::File)?;
      let services = services::Services::from_config(&config)?;
      let mut app = app::App::new(config, services);
      app.run().await
    }
  }
}
