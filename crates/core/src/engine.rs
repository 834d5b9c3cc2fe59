//! Browser engine seam.
//!
//! The snapshot and tab layers never talk to a concrete automation driver.
//! They drive these object-safe traits instead, so a Playwright driver
//! binding, a raw CDP client, or the in-memory fake used by the tests can
//! all sit underneath the same [`crate::Context`].
//!
//! Engine objects announce lifecycle changes through unbounded channels
//! obtained from [`BrowserContext::subscribe`] and [`Page::subscribe`].
//! The context and each tab are the only consumers of those channels.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pw_agent_protocol::{BrowserName, ConsoleMessage, LaunchOptions, LoadState, ScreenshotOptions};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;

/// Receiving end of an engine event stream.
pub type EventReceiver<T> = mpsc::UnboundedReceiver<T>;

/// Events raised by a browser context.
#[derive(Clone)]
pub enum ContextEvent {
	/// A page was opened in the context, either by us or by the page itself.
	Page(Arc<dyn Page>),
}

/// Events raised by a single page.
#[derive(Clone)]
pub enum PageEvent {
	Console(ConsoleMessage),
	/// A frame committed a navigation.
	FrameNavigated { main_frame: bool },
	FileChooser(Arc<dyn FileChooser>),
	/// A network request started.
	Request { id: String },
	/// A network request finished or failed.
	RequestFinished { id: String },
	Close,
}

impl std::fmt::Debug for PageEvent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			PageEvent::Console(msg) => f.debug_tuple("Console").field(msg).finish(),
			PageEvent::FrameNavigated { main_frame } => f.debug_struct("FrameNavigated").field("main_frame", main_frame).finish(),
			PageEvent::FileChooser(_) => f.write_str("FileChooser"),
			PageEvent::Request { id } => f.debug_struct("Request").field("id", id).finish(),
			PageEvent::RequestFinished { id } => f.debug_struct("RequestFinished").field("id", id).finish(),
			PageEvent::Close => f.write_str("Close"),
		}
	}
}

/// Entry point of an automation engine: the three ways to obtain a session.
#[async_trait]
pub trait Engine: Send + Sync {
	/// Connects to a remote browser server at `endpoint`.
	async fn connect(&self, browser: BrowserName, endpoint: &str) -> Result<Arc<dyn Browser>>;

	/// Attaches to an already-running Chromium over the DevTools protocol.
	async fn connect_over_cdp(&self, endpoint: &str) -> Result<Arc<dyn Browser>>;

	/// Launches a local browser bound to a persistent profile directory.
	async fn launch_persistent_context(&self, browser: BrowserName, user_data_dir: &Path, options: &LaunchOptions) -> Result<Arc<dyn BrowserContext>>;
}

#[async_trait]
pub trait Browser: Send + Sync {
	async fn new_context(&self) -> Result<Arc<dyn BrowserContext>>;

	/// Contexts that already exist in the browser, oldest first.
	fn contexts(&self) -> Vec<Arc<dyn BrowserContext>>;

	async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait BrowserContext: Send + Sync {
	/// Registers the single listener for context events.
	fn subscribe(&self) -> EventReceiver<ContextEvent>;

	/// Opens a page. The engine also reports it through [`ContextEvent::Page`].
	async fn new_page(&self) -> Result<Arc<dyn Page>>;

	async fn close(&self) -> Result<()>;
}

/// A document frame whose accessibility tree can be captured.
#[async_trait]
pub trait Frame: Send + Sync {
	/// Accessibility snapshot of the frame body as YAML, with `[ref=<id>]`
	/// markers numbered locally to this frame.
	async fn aria_snapshot(&self) -> Result<String>;

	/// Resolves an `iframe` element ref to the frame it hosts.
	async fn child_frame(&self, local_ref: &str) -> Result<Arc<dyn Frame>>;

	/// Resolves a local ref to an actionable element.
	async fn locate(&self, local_ref: &str) -> Result<Arc<dyn Element>>;
}

/// A top-level page; its main frame is the page itself.
#[async_trait]
pub trait Page: Frame {
	/// Engine-assigned identity, stable for the page's lifetime.
	fn guid(&self) -> &str;

	/// Registers the single listener for page events.
	fn subscribe(&self) -> EventReceiver<PageEvent>;

	/// Upcasts to the page's main frame.
	fn main_frame(self: Arc<Self>) -> Arc<dyn Frame>;

	fn url(&self) -> String;

	async fn title(&self) -> Result<String>;

	/// Navigates and resolves once `wait_until` is reached.
	async fn goto(&self, url: &str, wait_until: LoadState) -> Result<()>;

	/// Waits for `state`; fails with [`crate::Error::Timeout`] after `timeout`.
	async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()>;

	async fn go_back(&self) -> Result<()>;

	async fn go_forward(&self) -> Result<()>;

	async fn bring_to_front(&self) -> Result<()>;

	async fn close(&self) -> Result<()>;

	fn set_default_timeout(&self, timeout: Duration);

	fn set_default_navigation_timeout(&self, timeout: Duration);

	async fn press_key(&self, key: &str) -> Result<()>;

	async fn screenshot(&self, options: &ScreenshotOptions) -> Result<Vec<u8>>;

	async fn pdf(&self, path: &Path) -> Result<()>;

	/// Evaluates a JavaScript expression and returns its JSON value.
	async fn evaluate(&self, expression: &str) -> Result<Value>;
}

/// An element handle obtained from a snapshot ref.
#[async_trait]
pub trait Element: Send + Sync {
	async fn click(&self) -> Result<()>;

	async fn hover(&self) -> Result<()>;

	/// Replaces the element's value in one step.
	async fn fill(&self, text: &str) -> Result<()>;

	async fn press(&self, key: &str) -> Result<()>;

	/// Types one character at a time, firing key handlers.
	async fn press_sequentially(&self, text: &str) -> Result<()>;

	async fn select_option(&self, values: &[String]) -> Result<Vec<String>>;

	async fn drag_to(&self, target: &dyn Element) -> Result<()>;
}

/// A pending file chooser raised by the page.
#[async_trait]
pub trait FileChooser: Send + Sync {
	async fn set_files(&self, paths: &[PathBuf]) -> Result<()>;
}
