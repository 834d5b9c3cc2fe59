//! Browser installation through an external installer process.

use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ContextConfig;
use crate::error::{Error, Result};

/// Runs the configured installer for the configured channel.
///
/// Resolves with the channel name. A nonzero exit is reported as
/// [`Error::InstallFailed`] carrying the installer's combined output.
pub async fn install_browser(config: &ContextConfig) -> Result<String> {
	let channel = config.install_channel();
	let command = config.installer_command();
	let (program, args) = command
		.split_first()
		.ok_or_else(|| Error::Config("installer command must not be empty".into()))?;

	info!(target = "pw.install", %channel, %program, "installing browser");
	let output = Command::new(program)
		.args(args)
		.arg(&channel)
		.stdin(Stdio::null())
		.output()
		.await?;

	if output.status.success() {
		debug!(target = "pw.install", %channel, "installer finished");
		return Ok(channel);
	}

	let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
	combined.push_str(&String::from_utf8_lossy(&output.stderr));
	debug!(target = "pw.install", %channel, status = ?output.status.code(), "installer failed");
	Err(Error::InstallFailed { output: combined })
}
