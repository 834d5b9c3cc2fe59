//! One open page and the per-page state the agent observes between steps.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use pw_agent_protocol::{ConsoleMessage, LoadState};
use tracing::{debug, warn};

use crate::config::Timeouts;
use crate::engine::{EventReceiver, FileChooser, Page, PageEvent};
use crate::error::{Error, Result};
use crate::snapshot::{FILE_CHOOSER_NOTE, PageSnapshot};
use crate::wait;

/// Options recognized by [`crate::TabHandle::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
	/// Recapture the page after the action and report the snapshot.
	pub capture_snapshot: bool,
	/// Hold the action open until any navigation it triggered has settled.
	pub wait_for_completion: bool,
	/// Line shown ahead of the snapshot (or alone, without one).
	pub status: Option<String>,
	/// Keep a pending file chooser across this action.
	pub no_clear_file_chooser: bool,
}

impl RunOptions {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn status(mut self, status: impl Into<String>) -> Self {
		self.status = Some(status.into());
		self
	}

	pub fn capture_snapshot(mut self, capture: bool) -> Self {
		self.capture_snapshot = capture;
		self
	}

	pub fn wait_for_completion(mut self, wait: bool) -> Self {
		self.wait_for_completion = wait;
		self
	}

	pub fn keep_file_chooser(mut self) -> Self {
		self.no_clear_file_chooser = true;
		self
	}
}

/// A page opened in the session.
///
/// The tab is the only consumer of its page's event stream. Events are
/// applied lazily, whenever the owning context or an action drains them.
pub struct Tab {
	page: Arc<dyn Page>,
	guid: String,
	events: EventReceiver<PageEvent>,
	console: Vec<ConsoleMessage>,
	file_chooser: Option<Arc<dyn FileChooser>>,
	snapshot: Option<PageSnapshot>,
	timeouts: Timeouts,
	closed: bool,
}

impl Tab {
	/// Wraps a freshly reported page and applies the context's timeouts to it.
	pub(crate) fn new(page: Arc<dyn Page>, timeouts: Timeouts) -> Self {
		let events = page.subscribe();
		page.set_default_navigation_timeout(timeouts.navigation());
		page.set_default_timeout(timeouts.action());
		let guid = page.guid().to_string();
		debug!(target = "pw.tab", %guid, "tab opened");
		Self {
			page,
			guid,
			events,
			console: Vec::new(),
			file_chooser: None,
			snapshot: None,
			timeouts,
			closed: false,
		}
	}

	pub fn page(&self) -> &Arc<dyn Page> {
		&self.page
	}

	pub fn guid(&self) -> &str {
		&self.guid
	}

	pub fn timeouts(&self) -> &Timeouts {
		&self.timeouts
	}

	/// Whether the page reported that it closed.
	pub fn is_closed(&self) -> bool {
		self.closed
	}

	pub fn has_file_chooser(&self) -> bool {
		self.file_chooser.is_some()
	}

	/// Console messages since the last top-level navigation or tab creation.
	pub fn console(&self) -> &[ConsoleMessage] {
		&self.console
	}

	/// Most recent snapshot; refs are only valid against this one.
	pub fn last_snapshot(&self) -> Result<&PageSnapshot> {
		self.snapshot.as_ref().ok_or(Error::NoSnapshot)
	}

	/// Navigates and waits for DOM ready. The full `load` milestone is awaited
	/// for at most the load cap and its timeout is ignored.
	pub async fn navigate(&mut self, url: &str) -> Result<()> {
		self.page.goto(url, LoadState::DomContentLoaded).await?;
		if let Err(err) = self.page.wait_for_load_state(LoadState::Load, self.timeouts.load_cap()).await {
			debug!(target = "pw.tab", %url, error = %err, "load milestone not reached; continuing");
		}
		Ok(())
	}

	/// Hands `paths` to the pending file chooser and clears it.
	pub async fn submit_file_chooser(&mut self, paths: &[PathBuf]) -> Result<()> {
		self.drain_events();
		let chooser = self.file_chooser.take().ok_or(Error::NoFileChooser)?;
		chooser.set_files(paths).await?;
		debug!(target = "pw.tab", guid = %self.guid, files = paths.len(), "file chooser submitted");
		Ok(())
	}

	/// Captures a new snapshot, replacing the previous one.
	pub async fn capture_snapshot(&mut self) -> Result<&PageSnapshot> {
		let snapshot = PageSnapshot::capture(&self.page).await?;
		Ok(&*self.snapshot.insert(snapshot))
	}

	/// Runs `action` against this tab with the orchestration in `options`.
	///
	/// The snapshot requested by `options` is captured even when the action
	/// fails; the action's error is still what the caller sees.
	pub(crate) async fn execute<F>(&mut self, action: F, options: &RunOptions) -> Result<()>
	where
		F: for<'t> FnOnce(&'t mut Tab) -> BoxFuture<'t, Result<()>> + Send,
	{
		self.drain_events();
		if !options.no_clear_file_chooser {
			self.file_chooser = None;
		}

		let outcome = if options.wait_for_completion {
			wait::wait_for_completion(self, action).await
		} else {
			action(self).await
		};
		match &outcome {
			Err(err) if err.is_validation() => debug!(target = "pw.tab", guid = %self.guid, error = %err, "action rejected"),
			Err(err) => warn!(target = "pw.tab", guid = %self.guid, error = %err, "action failed"),
			Ok(()) => {}
		}

		if options.capture_snapshot {
			self.drain_events();
			if let Err(err) = self.capture_snapshot().await.map(|_| ()) {
				if outcome.is_ok() {
					return Err(err);
				}
				warn!(target = "pw.tab", guid = %self.guid, error = %err, "snapshot after failed action also failed");
			}
		}
		outcome
	}

	/// Report body for a finished run: the snapshot when one was requested,
	/// otherwise the status line.
	pub(crate) fn render_body(&self, options: &RunOptions) -> String {
		let status = options.status.as_deref();
		if options.capture_snapshot {
			if let Some(snapshot) = &self.snapshot {
				return snapshot.render(status, self.has_file_chooser());
			}
		}
		let mut parts = Vec::new();
		if let Some(status) = status {
			parts.push(status);
		}
		if self.has_file_chooser() {
			parts.push(FILE_CHOOSER_NOTE);
		}
		parts.join("\n\n")
	}

	/// Applies every buffered page event.
	pub(crate) fn drain_events(&mut self) {
		while self.try_next_event().is_some() {}
	}

	/// Pops and applies one buffered event, if any.
	pub(crate) fn try_next_event(&mut self) -> Option<PageEvent> {
		let event = self.events.try_recv().ok()?;
		self.apply(&event);
		Some(event)
	}

	/// Waits for the next page event and applies it.
	pub(crate) async fn next_event(&mut self) -> Option<PageEvent> {
		let event = self.events.recv().await?;
		self.apply(&event);
		Some(event)
	}

	fn apply(&mut self, event: &PageEvent) {
		match event {
			PageEvent::Console(message) => self.console.push(message.clone()),
			PageEvent::FrameNavigated { main_frame: true } => self.console.clear(),
			PageEvent::FileChooser(chooser) => self.file_chooser = Some(Arc::clone(chooser)),
			PageEvent::Close => {
				self.file_chooser = None;
				self.console.clear();
				if !self.closed {
					debug!(target = "pw.tab", guid = %self.guid, "page closed");
				}
				self.closed = true;
			}
			PageEvent::FrameNavigated { main_frame: false } | PageEvent::Request { .. } | PageEvent::RequestFinished { .. } => {}
		}
	}
}

impl std::fmt::Debug for Tab {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Tab")
			.field("guid", &self.guid)
			.field("console", &self.console.len())
			.field("file_chooser", &self.file_chooser.is_some())
			.field("snapshot", &self.snapshot.is_some())
			.field("closed", &self.closed)
			.finish()
	}
}

/// Renders console messages one per line, as `[LEVEL] text`.
pub fn render_console(messages: &[ConsoleMessage]) -> String {
	messages.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n")
}
