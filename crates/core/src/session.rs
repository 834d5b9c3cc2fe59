//! Browser session acquisition and teardown.
//!
//! A session is one browser connection plus the browser context all tabs
//! share. The acquisition strategy is resolved once from
//! [`ContextConfig`] and never re-examined afterwards.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use pw_agent_protocol::{BrowserName, LaunchOptions};
use tracing::{debug, info};
use url::Url;

use crate::config::ContextConfig;
use crate::engine::{Browser, BrowserContext, ContextEvent, Engine, EventReceiver};
use crate::error::{Error, Result};

/// Launch failure signature reported when the browser binary is absent.
const MISSING_EXECUTABLE: &str = "Executable doesn't exist";

/// How a session is obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStrategy {
	/// Connect to a browser server; the URL already carries the
	/// `browser` and `launch-options` query parameters.
	Remote { browser: BrowserName, endpoint: Url },
	/// Attach to a running Chromium over CDP and use its first context.
	Cdp { endpoint: String },
	/// Launch a local browser with a persistent profile.
	Persistent {
		browser: BrowserName,
		user_data_dir: PathBuf,
		launch_options: LaunchOptions,
	},
}

impl SessionStrategy {
	/// Picks the strategy: remote endpoint, then CDP endpoint, then local launch.
	pub fn resolve(config: &ContextConfig) -> Result<Self> {
		if let Some(endpoint) = &config.remote_endpoint {
			let mut url = Url::parse(endpoint).map_err(|e| Error::InvalidEndpoint {
				endpoint: endpoint.clone(),
				reason: e.to_string(),
			})?;
			tag_remote_url(&mut url, config)?;
			return Ok(SessionStrategy::Remote {
				browser: config.browser(),
				endpoint: url,
			});
		}
		if let Some(endpoint) = &config.cdp_endpoint {
			return Ok(SessionStrategy::Cdp { endpoint: endpoint.clone() });
		}
		Ok(SessionStrategy::Persistent {
			browser: config.browser(),
			user_data_dir: config.resolved_user_data_dir(),
			launch_options: config.launch_options.clone().unwrap_or_default(),
		})
	}

	pub fn name(&self) -> &'static str {
		match self {
			SessionStrategy::Remote { .. } => "remote",
			SessionStrategy::Cdp { .. } => "cdp",
			SessionStrategy::Persistent { .. } => "persistent",
		}
	}
}

impl fmt::Display for SessionStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SessionStrategy::Remote { browser, endpoint } => write!(f, "remote {browser} at {endpoint}"),
			SessionStrategy::Cdp { endpoint } => write!(f, "cdp at {endpoint}"),
			SessionStrategy::Persistent { browser, user_data_dir, .. } => {
				write!(f, "persistent {browser} in {}", user_data_dir.display())
			}
		}
	}
}

/// Sets the `browser` and `launch-options` query parameters, replacing any
/// values already present in the configured endpoint.
fn tag_remote_url(url: &mut Url, config: &ContextConfig) -> Result<()> {
	let mut tags = Vec::new();
	if let Some(browser) = config.browser_name {
		tags.push(("browser", browser.to_string()));
	}
	if let Some(options) = &config.launch_options {
		tags.push(("launch-options", serde_json::to_string(options)?));
	}
	if tags.is_empty() {
		return Ok(());
	}

	let kept: Vec<(String, String)> = url
		.query_pairs()
		.filter(|(key, _)| !tags.iter().any(|(tag, _)| key == tag))
		.map(|(key, value)| (key.into_owned(), value.into_owned()))
		.collect();
	let mut query = url.query_pairs_mut();
	query.clear();
	for (key, value) in &kept {
		query.append_pair(key, value);
	}
	for (key, value) in &tags {
		query.append_pair(key, value);
	}
	Ok(())
}

/// A live browser connection and the context shared by every tab.
pub(crate) struct Session {
	/// Absent for persistent launches, where closing the context ends the browser.
	browser: Option<Arc<dyn Browser>>,
	context: Arc<dyn BrowserContext>,
	pub(crate) events: EventReceiver<ContextEvent>,
}

impl Session {
	pub(crate) async fn establish(engine: &dyn Engine, strategy: &SessionStrategy) -> Result<Self> {
		info!(target = "pw.session", strategy = strategy.name(), %strategy, "establishing session");
		let (browser, context) = match strategy {
			SessionStrategy::Remote { browser, endpoint } => {
				let browser = engine.connect(*browser, endpoint.as_str()).await?;
				let context = browser.new_context().await?;
				(Some(browser), context)
			}
			SessionStrategy::Cdp { endpoint } => {
				let browser = engine.connect_over_cdp(endpoint).await?;
				let context = browser
					.contexts()
					.into_iter()
					.next()
					.ok_or_else(|| Error::engine(format!("browser at {endpoint} has no open context")))?;
				(Some(browser), context)
			}
			SessionStrategy::Persistent {
				browser,
				user_data_dir,
				launch_options,
			} => {
				let context = engine
					.launch_persistent_context(*browser, user_data_dir, launch_options)
					.await
					.map_err(map_launch_error)?;
				(None, context)
			}
		};
		let events = context.subscribe();
		Ok(Self { browser, context, events })
	}

	pub(crate) fn context(&self) -> &Arc<dyn BrowserContext> {
		&self.context
	}

	/// Closes the context, then the browser, propagating the first failure.
	pub(crate) async fn close(self) -> Result<()> {
		self.context.close().await?;
		if let Some(browser) = &self.browser {
			browser.close().await?;
		}
		debug!(target = "pw.session", "session closed");
		Ok(())
	}

	/// Best-effort [`Session::close`]; failures are only logged.
	pub(crate) async fn teardown(self) {
		if let Err(err) = self.close().await {
			debug!(target = "pw.session", error = %err, "session teardown failed");
		}
	}
}

fn map_launch_error(err: Error) -> Error {
	match &err {
		Error::Engine(message) if message.contains(MISSING_EXECUTABLE) => Error::BrowserNotInstalled,
		_ => err,
	}
}
