//! Context configuration.
//!
//! Loaded once per [`crate::Context`] from a JSON file or built in code.
//! The session strategy and all per-page timeouts come from here; nothing
//! is configurable per call.

use std::path::{Path, PathBuf};
use std::time::Duration;

use pw_agent_protocol::{BrowserName, DEFAULT_ACTION_TIMEOUT_MS, DEFAULT_NAVIGATION_TIMEOUT_MS, LaunchOptions};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_LOAD_CAP_MS: u64 = 5_000;
const DEFAULT_COMPLETION_CAP_MS: u64 = 10_000;
const DEFAULT_SETTLE_MS: u64 = 1_000;

/// Timeout policy applied to every tab of a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timeouts {
	/// Default timeout for element actions.
	pub action_ms: u64,
	/// Default timeout for navigations.
	pub navigation_ms: u64,
	/// Soft cap on waiting for the `load` milestone after a navigation.
	pub load_cap_ms: u64,
	/// Upper bound on the completion wait when no navigation was triggered.
	pub completion_cap_ms: u64,
	/// Quiet period after an action settles, before the snapshot is taken.
	pub settle_ms: u64,
}

impl Default for Timeouts {
	fn default() -> Self {
		Self {
			action_ms: DEFAULT_ACTION_TIMEOUT_MS,
			navigation_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
			load_cap_ms: DEFAULT_LOAD_CAP_MS,
			completion_cap_ms: DEFAULT_COMPLETION_CAP_MS,
			settle_ms: DEFAULT_SETTLE_MS,
		}
	}
}

impl Timeouts {
	pub fn action(&self) -> Duration {
		Duration::from_millis(self.action_ms)
	}

	pub fn navigation(&self) -> Duration {
		Duration::from_millis(self.navigation_ms)
	}

	pub fn load_cap(&self) -> Duration {
		Duration::from_millis(self.load_cap_ms)
	}

	pub fn completion_cap(&self) -> Duration {
		Duration::from_millis(self.completion_cap_ms)
	}

	pub fn settle(&self) -> Duration {
		Duration::from_millis(self.settle_ms)
	}
}

/// Configuration for a [`crate::Context`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextConfig {
	/// Engine family; defaults to Chromium when unset.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub browser_name: Option<BrowserName>,
	/// Profile directory for persistent launches.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_data_dir: Option<PathBuf>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub launch_options: Option<LaunchOptions>,
	/// DevTools endpoint of an already-running browser.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cdp_endpoint: Option<String>,
	/// Browser server endpoint to connect to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub remote_endpoint: Option<String>,
	/// Installer command; the browser channel is appended as the last argument.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub installer: Option<Vec<String>>,
	#[serde(default)]
	pub timeouts: Timeouts,
}

impl ContextConfig {
	/// Reads a JSON configuration file.
	pub fn from_file(path: &Path) -> Result<Self> {
		let content = std::fs::read_to_string(path).map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
		let config: Self = serde_json::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
		config.validate()?;
		Ok(config)
	}

	/// Rejects configurations that can never produce a session.
	pub fn validate(&self) -> Result<()> {
		if let Some(installer) = &self.installer {
			if installer.is_empty() {
				return Err(Error::Config("installer command must not be empty".into()));
			}
		}
		if self.cdp_endpoint.is_some() && self.browser() != BrowserName::Chromium {
			return Err(Error::Config(format!("cdpEndpoint requires chromium, not {}", self.browser())));
		}
		Ok(())
	}

	pub fn browser(&self) -> BrowserName {
		self.browser_name.unwrap_or_default()
	}

	/// Channel handed to the installer: launch channel, then browser name, then `chrome`.
	pub fn install_channel(&self) -> String {
		self.launch_options
			.as_ref()
			.and_then(|o| o.channel.clone())
			.or_else(|| self.browser_name.map(|b| b.to_string()))
			.unwrap_or_else(|| "chrome".to_string())
	}

	/// Profile directory used for persistent launches.
	pub fn resolved_user_data_dir(&self) -> PathBuf {
		if let Some(dir) = &self.user_data_dir {
			return dir.clone();
		}
		let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
		base.join("pw-agent").join(format!("{}-profile", self.install_channel()))
	}

	pub fn installer_command(&self) -> Vec<String> {
		self.installer
			.clone()
			.unwrap_or_else(|| vec!["npx".to_string(), "playwright".to_string(), "install".to_string()])
	}
}
