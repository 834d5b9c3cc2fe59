//! Tab set and session lifecycle.
//!
//! A [`Context`] owns at most one [`Session`] and the ordered list of open
//! tabs. Pages announced by the engine become tabs, closed pages are
//! dropped, and the session is torn down in the background once the last
//! tab is gone. Engine events are folded in whenever a public operation
//! runs, so callers always see a consistent tab list.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::ContextConfig;
use crate::engine::{ContextEvent, Engine, Page};
use crate::error::{Error, Result};
use crate::install;
use crate::report::Report;
use crate::session::{Session, SessionStrategy};
use crate::tab::{RunOptions, Tab};

pub struct Context {
	engine: Arc<dyn Engine>,
	config: ContextConfig,
	session: Option<Session>,
	tabs: Vec<Tab>,
	current: Option<String>,
	teardown: Option<JoinHandle<()>>,
}

impl Context {
	pub fn new(engine: Arc<dyn Engine>, config: ContextConfig) -> Self {
		Self {
			engine,
			config,
			session: None,
			tabs: Vec::new(),
			current: None,
			teardown: None,
		}
	}

	pub fn config(&self) -> &ContextConfig {
		&self.config
	}

	/// Whether a browser session is currently held.
	pub fn has_session(&self) -> bool {
		self.session.is_some()
	}

	/// Open tabs in the order they were reported.
	pub fn tabs(&mut self) -> &[Tab] {
		self.sync();
		&self.tabs
	}

	/// Returns the current tab, opening a session and a page if there is none.
	pub async fn ensure_tab(&mut self) -> Result<TabHandle<'_>> {
		self.sync();
		if self.current.is_none() {
			self.open_page().await?;
		}
		self.current_tab()
	}

	/// Returns the current tab or [`Error::NoCurrentTab`].
	pub fn current_tab(&mut self) -> Result<TabHandle<'_>> {
		self.sync();
		let index = self
			.current
			.as_deref()
			.and_then(|guid| self.tab_index(guid))
			.ok_or(Error::NoCurrentTab)?;
		Ok(TabHandle { context: self, index })
	}

	/// Opens a page and makes it current.
	pub async fn new_tab(&mut self) -> Result<TabHandle<'_>> {
		let guid = self.open_page().await?;
		let index = self.tab_index(&guid).ok_or(Error::NoCurrentTab)?;
		self.current = Some(guid);
		Ok(TabHandle { context: self, index })
	}

	/// Makes the tab at 1-based `index` current and brings it to the front.
	pub async fn select_tab(&mut self, index: usize) -> Result<()> {
		self.sync();
		let position = self.position(index)?;
		let tab = &self.tabs[position];
		self.current = Some(tab.guid().to_string());
		tab.page().bring_to_front().await
	}

	/// Renders the tab list, marking the current tab.
	pub async fn list_tabs(&mut self) -> Result<String> {
		self.sync();
		if self.tabs.is_empty() {
			return Ok("No tabs open".to_string());
		}
		let mut lines = vec!["Open tabs:".to_string()];
		for (i, tab) in self.tabs.iter().enumerate() {
			let title = tab.page().title().await?;
			let url = tab.page().url();
			let current = if self.current.as_deref() == Some(tab.guid()) { " (current)" } else { "" };
			lines.push(format!("- {}:{current} [{title}] ({url})", i + 1));
		}
		Ok(lines.join("\n"))
	}

	/// Closes the tab at 1-based `index`, or the current tab, and returns
	/// the remaining tab list.
	pub async fn close_tab(&mut self, index: Option<usize>) -> Result<String> {
		self.sync();
		let position = match index {
			Some(index) => self.position(index)?,
			None => self
				.current
				.as_deref()
				.and_then(|guid| self.tab_index(guid))
				.ok_or(Error::NoCurrentTab)?,
		};
		self.tabs[position].page().close().await?;
		self.list_tabs().await
	}

	/// Installs the configured browser and returns the installed channel.
	pub async fn install(&self) -> Result<String> {
		install::install_browser(&self.config).await
	}

	/// Closes the session, if any, and forgets every tab.
	pub async fn close(&mut self) -> Result<()> {
		self.tabs.clear();
		self.current = None;
		self.await_teardown().await;
		if let Some(session) = self.session.take() {
			session.close().await?;
			info!(target = "pw.session", "context closed");
		}
		Ok(())
	}

	/// Opens a page, creating the session first when needed. Returns its guid.
	async fn open_page(&mut self) -> Result<String> {
		let session = match self.session.take() {
			Some(session) => session,
			None => {
				self.await_teardown().await;
				let strategy = SessionStrategy::resolve(&self.config)?;
				Session::establish(self.engine.as_ref(), &strategy).await?
			}
		};
		let page = match session.context().new_page().await {
			Ok(page) => page,
			Err(err) if self.tabs.is_empty() => {
				debug!(target = "pw.session", error = %err, "no page opened; dropping session");
				session.teardown().await;
				return Err(err);
			}
			Err(err) => {
				self.session = Some(session);
				return Err(err);
			}
		};
		self.session = Some(session);

		let guid = page.guid().to_string();
		self.sync();
		if self.tab_index(&guid).is_none() {
			self.on_page_created(page);
		}
		Ok(guid)
	}

	async fn await_teardown(&mut self) {
		if let Some(pending) = self.teardown.take() {
			if let Err(err) = pending.await {
				debug!(target = "pw.session", error = %err, "session teardown task failed");
			}
		}
	}

	/// Folds pending engine events into the tab list.
	fn sync(&mut self) {
		let mut created = Vec::new();
		if let Some(session) = &mut self.session {
			while let Ok(ContextEvent::Page(page)) = session.events.try_recv() {
				created.push(page);
			}
		}
		for page in created {
			if self.tab_index(page.guid()).is_none() {
				self.on_page_created(page);
			}
		}

		for tab in &mut self.tabs {
			tab.drain_events();
		}
		let closed: Vec<String> = self.tabs.iter().filter(|t| t.is_closed()).map(|t| t.guid().to_string()).collect();
		for guid in closed {
			self.on_page_closed(&guid);
		}
	}

	fn on_page_created(&mut self, page: Arc<dyn Page>) {
		let tab = Tab::new(page, self.config.timeouts.clone());
		if self.current.is_none() {
			self.current = Some(tab.guid().to_string());
		}
		debug!(target = "pw.session", guid = %tab.guid(), tabs = self.tabs.len() + 1, "page created");
		self.tabs.push(tab);
	}

	fn on_page_closed(&mut self, guid: &str) {
		self.tabs.retain(|t| t.guid() != guid);
		if self.current.as_deref() == Some(guid) {
			self.current = self.tabs.first().map(|t| t.guid().to_string());
		}
		debug!(target = "pw.session", %guid, tabs = self.tabs.len(), "page removed");

		if self.tabs.is_empty() {
			if let Some(session) = self.session.take() {
				info!(target = "pw.session", "last tab closed; tearing down session");
				match tokio::runtime::Handle::try_current() {
					Ok(runtime) => self.teardown = Some(runtime.spawn(session.teardown())),
					Err(_) => debug!(target = "pw.session", "no runtime for session teardown; dropping session"),
				}
			}
		}
	}

	fn tab_index(&self, guid: &str) -> Option<usize> {
		self.tabs.iter().position(|t| t.guid() == guid)
	}

	/// Converts a 1-based tab index into a list position.
	fn position(&self, index: usize) -> Result<usize> {
		if index == 0 || index > self.tabs.len() {
			return Err(Error::InvalidTabIndex {
				index,
				count: self.tabs.len(),
			});
		}
		Ok(index - 1)
	}
}

/// Exclusive access to one tab of a [`Context`].
///
/// Dereferences to the [`Tab`]; the `run*` methods consume the handle and
/// compose the step's [`Report`] from the whole context.
pub struct TabHandle<'a> {
	context: &'a mut Context,
	index: usize,
}

impl TabHandle<'_> {
	/// Runs `action` on this tab and reports the result.
	///
	/// When more than one tab is open the report starts with the tab list.
	/// Action failures are returned as errors after the cleanup phase ran.
	pub async fn run<F>(self, action: F, options: RunOptions) -> Result<Report>
	where
		F: for<'t> FnOnce(&'t mut Tab) -> BoxFuture<'t, Result<()>> + Send,
	{
		let context = self.context;
		let guid = context.tabs[self.index].guid().to_string();
		context.tabs[self.index].execute(action, &options).await?;

		context.sync();
		let mut text = String::new();
		if context.tabs.len() > 1 {
			text.push_str(&context.list_tabs().await?);
			text.push_str("\n\nCurrent tab:\n");
		}
		match context.tab_index(&guid) {
			Some(index) => text.push_str(&context.tabs[index].render_body(&options)),
			None => text.push_str(options.status.as_deref().unwrap_or_default()),
		}
		Ok(Report::text(text))
	}

	/// [`TabHandle::run`] with the completion wait enabled.
	pub async fn run_and_wait<F>(self, action: F, options: RunOptions) -> Result<Report>
	where
		F: for<'t> FnOnce(&'t mut Tab) -> BoxFuture<'t, Result<()>> + Send,
	{
		self.run(action, options.wait_for_completion(true)).await
	}

	/// [`TabHandle::run`] with the completion wait and a fresh snapshot.
	pub async fn run_and_wait_with_snapshot<F>(self, action: F, options: RunOptions) -> Result<Report>
	where
		F: for<'t> FnOnce(&'t mut Tab) -> BoxFuture<'t, Result<()>> + Send,
	{
		self.run(action, options.wait_for_completion(true).capture_snapshot(true)).await
	}
}

impl Deref for TabHandle<'_> {
	type Target = Tab;

	fn deref(&self) -> &Tab {
		&self.context.tabs[self.index]
	}
}

impl DerefMut for TabHandle<'_> {
	fn deref_mut(&mut self) -> &mut Tab {
		&mut self.context.tabs[self.index]
	}
}
