use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pw_agent::protocol::BrowserName;

#[derive(Parser, Debug)]
#[command(name = "pw-agent")]
#[command(about = "Snapshot-and-reference browser driving for agents")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Context configuration file (JSON)
	#[arg(short, long, global = true, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Override the configured browser (chromium, firefox, webkit)
	#[arg(short, long, global = true)]
	pub browser: Option<BrowserName>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Install the configured browser
	Install,

	/// Print the resolved configuration and session strategy
	Config {
		/// Print only the session strategy
		#[arg(long)]
		strategy: bool,
	},
}
