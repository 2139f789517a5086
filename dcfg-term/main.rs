//! Command-line shell for dcfg documents held by a running backend.
//!
//! Each invocation mirrors one document from the service, runs a single
//! command against it and prints the result.

mod commands;
mod render;

use std::{
  path::PathBuf,
  sync::Arc,
};

use clap::Parser;
use dcfg_client::HttpDocumentService;
use dcfg_runtime::{
  EngineConfig,
  Workspace,
};
use eyre::{
  Result,
  WrapErr,
};
use tracing_subscriber::EnvFilter;

use crate::commands::Command;

#[derive(Debug, Parser)]
#[command(name = "dcfg")]
#[command(about = "Edit AF and mutex config documents through the dcfg service")]
struct Cli {
  /// Id the document is loaded under
  #[arg(long, global = true, default_value = "main")]
  doc_id: String,

  /// Config file to use instead of the user and workspace config
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Service url, overriding the configured one
  #[arg(long, global = true)]
  url: Option<String>,

  /// More log output; repeat for more detail
  #[arg(short, long, global = true, action = clap::ArgAction::Count)]
  verbose: u8,

  #[command(subcommand)]
  command: Command,
}

/// `DCFG_LOG` takes precedence over `-v`.
fn init_logging(verbose: u8) {
  let level = match verbose {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };
  let filter = EnvFilter::try_from_env("DCFG_LOG").unwrap_or_else(|_| EnvFilter::new(level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .init();
}

fn load_config(cli: &Cli) -> Result<EngineConfig> {
  let mut config = match &cli.config {
    Some(path) => {
      EngineConfig::load_file(path)
        .wrap_err_with(|| format!("failed to load config {}", path.display()))?
    },
    None => EngineConfig::load_user(&std::env::current_dir()?)?,
  };
  if let Some(url) = &cli.url {
    config.service.base_url = url.clone();
  }
  Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let config = load_config(&cli)?;
  let service = Arc::new(HttpDocumentService::new(&config.service)?);
  let workspace = Workspace::create(service, &config);

  commands::run(&workspace, cli.doc_id.into(), cli.command).await
}
