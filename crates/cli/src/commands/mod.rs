//! Command dispatch.

mod config;
mod install;

use anyhow::Result;
use pw_agent::ContextConfig;

use crate::cli::{Cli, Commands};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let config = load_config(&cli)?;
	match cli.command {
		Commands::Install => install::execute(&config).await,
		Commands::Config { strategy } => config::execute(&config, strategy),
	}
}

/// Reads the config file, if any, and applies command-line overrides.
pub fn load_config(cli: &Cli) -> Result<ContextConfig> {
	let mut config = match &cli.config {
		Some(path) => ContextConfig::from_file(path)?,
		None => ContextConfig::default(),
	};
	if let Some(browser) = cli.browser {
		config.browser_name = Some(browser);
	}
	config.validate()?;
	Ok(config)
}
