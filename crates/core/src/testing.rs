//! In-memory engine for unit tests.
//!
//! Every fake records the calls made against it and lets the test inject
//! engine events, so the tab and session layers can be exercised without a
//! browser.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pw_agent_protocol::{BrowserName, ConsoleMessage, LaunchOptions, LoadState, ScreenshotFormat, ScreenshotOptions};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::ContextConfig;
use crate::engine::{Browser, BrowserContext, ContextEvent, Element, Engine, EventReceiver, FileChooser, Frame, Page, PageEvent};
use crate::error::{Error, Result};

/// Installs a test-writer subscriber once per test binary.
pub fn init_logging() {
	let _ = tracing_subscriber::fmt()
		.with_test_writer()
		.with_max_level(tracing::Level::DEBUG)
		.try_init();
}

/// Config with waits shortened for tests.
pub fn test_config() -> ContextConfig {
	let mut config = ContextConfig::default();
	config.timeouts.settle_ms = 0;
	config.timeouts.load_cap_ms = 50;
	config.timeouts.completion_cap_ms = 200;
	config
}

/// A single-subscriber event stream that buffers until someone listens.
struct EventStream<T> {
	sender: mpsc::UnboundedSender<T>,
	receiver: Mutex<Option<EventReceiver<T>>>,
}

impl<T> EventStream<T> {
	fn new() -> Self {
		let (sender, receiver) = mpsc::unbounded_channel();
		Self {
			sender,
			receiver: Mutex::new(Some(receiver)),
		}
	}

	fn emit(&self, event: T) {
		let _ = self.sender.send(event);
	}

	fn subscribe(&self) -> EventReceiver<T> {
		self.receiver.lock().take().unwrap_or_else(|| mpsc::unbounded_channel().1)
	}
}

pub struct FakeElement {
	name: String,
	actions: Mutex<Vec<String>>,
	failure: Mutex<Option<String>>,
}

impl FakeElement {
	fn new(name: &str) -> Arc<Self> {
		Arc::new(Self {
			name: name.to_string(),
			actions: Mutex::new(Vec::new()),
			failure: Mutex::new(None),
		})
	}

	pub fn actions(&self) -> Vec<String> {
		self.actions.lock().clone()
	}

	/// Makes every subsequent action fail with `message`.
	pub fn fail_actions(&self, message: &str) {
		*self.failure.lock() = Some(message.to_string());
	}

	fn record(&self, action: String) -> Result<()> {
		if let Some(message) = self.failure.lock().clone() {
			return Err(Error::engine(message));
		}
		self.actions.lock().push(action);
		Ok(())
	}
}

#[async_trait]
impl Element for FakeElement {
	async fn click(&self) -> Result<()> {
		self.record("click".into())
	}

	async fn hover(&self) -> Result<()> {
		self.record("hover".into())
	}

	async fn fill(&self, text: &str) -> Result<()> {
		self.record(format!("fill {text}"))
	}

	async fn press(&self, key: &str) -> Result<()> {
		self.record(format!("press {key}"))
	}

	async fn press_sequentially(&self, text: &str) -> Result<()> {
		self.record(format!("type {text}"))
	}

	async fn select_option(&self, values: &[String]) -> Result<Vec<String>> {
		self.record(format!("select {}", values.join(",")))?;
		Ok(values.to_vec())
	}

	async fn drag_to(&self, _target: &dyn Element) -> Result<()> {
		self.record("drag".into())
	}
}

impl std::fmt::Debug for FakeElement {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FakeElement").field("name", &self.name).finish()
	}
}

pub struct FakeFrame {
	snapshot: Mutex<String>,
	children: Mutex<HashMap<String, Arc<FakeFrame>>>,
	elements: Mutex<HashMap<String, Arc<FakeElement>>>,
	failure: Mutex<Option<String>>,
}

impl FakeFrame {
	pub fn new(snapshot: &str) -> Arc<Self> {
		Arc::new(Self {
			snapshot: Mutex::new(snapshot.to_string()),
			children: Mutex::new(HashMap::new()),
			elements: Mutex::new(HashMap::new()),
			failure: Mutex::new(None),
		})
	}

	pub fn set_snapshot(&self, snapshot: &str) {
		*self.snapshot.lock() = snapshot.to_string();
	}

	pub fn add_child(&self, local_ref: &str, child: Arc<FakeFrame>) {
		self.children.lock().insert(local_ref.to_string(), child);
	}

	pub fn add_element(&self, local_ref: &str, name: &str) -> Arc<FakeElement> {
		let element = FakeElement::new(name);
		self.elements.lock().insert(local_ref.to_string(), Arc::clone(&element));
		element
	}

	pub fn fail_snapshots(&self, message: &str) {
		*self.failure.lock() = Some(message.to_string());
	}
}

#[async_trait]
impl Frame for FakeFrame {
	async fn aria_snapshot(&self) -> Result<String> {
		if let Some(message) = self.failure.lock().clone() {
			return Err(Error::engine(message));
		}
		Ok(self.snapshot.lock().clone())
	}

	async fn child_frame(&self, local_ref: &str) -> Result<Arc<dyn Frame>> {
		let child = self.children.lock().get(local_ref).cloned();
		match child {
			Some(child) => Ok(child),
			None => Err(Error::engine(format!("no frame behind ref {local_ref}"))),
		}
	}

	async fn locate(&self, local_ref: &str) -> Result<Arc<dyn Element>> {
		let element = self.elements.lock().get(local_ref).cloned();
		match element {
			Some(element) => Ok(element),
			None => Err(Error::engine(format!("Ref {local_ref} not found in the current page snapshot"))),
		}
	}
}

pub struct FakeFileChooser {
	files: Mutex<Vec<PathBuf>>,
}

impl FakeFileChooser {
	pub fn new() -> Arc<Self> {
		Arc::new(Self { files: Mutex::new(Vec::new()) })
	}

	pub fn files(&self) -> Vec<PathBuf> {
		self.files.lock().clone()
	}
}

#[async_trait]
impl FileChooser for FakeFileChooser {
	async fn set_files(&self, paths: &[PathBuf]) -> Result<()> {
		self.files.lock().extend_from_slice(paths);
		Ok(())
	}
}

pub struct FakePage {
	guid: String,
	frame: Arc<FakeFrame>,
	location: Mutex<(String, String)>,
	events: EventStream<PageEvent>,
	calls: Mutex<Vec<String>>,
	timeouts: Mutex<(Option<Duration>, Option<Duration>)>,
	load_failure: Mutex<Option<String>>,
	evaluate_result: Mutex<Value>,
	closed: AtomicBool,
}

impl FakePage {
	pub fn new(guid: &str, snapshot: &str) -> Arc<Self> {
		Arc::new(Self {
			guid: guid.to_string(),
			frame: FakeFrame::new(snapshot),
			location: Mutex::new(("about:blank".to_string(), String::new())),
			events: EventStream::new(),
			calls: Mutex::new(Vec::new()),
			timeouts: Mutex::new((None, None)),
			load_failure: Mutex::new(None),
			evaluate_result: Mutex::new(Value::Null),
			closed: AtomicBool::new(false),
		})
	}

	pub fn frame(&self) -> &Arc<FakeFrame> {
		&self.frame
	}

	pub fn set_location(&self, url: &str, title: &str) {
		*self.location.lock() = (url.to_string(), title.to_string());
	}

	pub fn emit(&self, event: PageEvent) {
		self.events.emit(event);
	}

	pub fn emit_console(&self, message: ConsoleMessage) {
		self.emit(PageEvent::Console(message));
	}

	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().clone()
	}

	/// `(action, navigation)` timeouts applied by the tab.
	pub fn timeouts(&self) -> (Option<Duration>, Option<Duration>) {
		*self.timeouts.lock()
	}

	/// Makes `wait_for_load_state` time out.
	pub fn fail_load(&self, message: &str) {
		*self.load_failure.lock() = Some(message.to_string());
	}

	pub fn set_evaluate_result(&self, value: Value) {
		*self.evaluate_result.lock() = value;
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	fn record(&self, call: String) {
		self.calls.lock().push(call);
	}
}

#[async_trait]
impl Frame for FakePage {
	async fn aria_snapshot(&self) -> Result<String> {
		self.frame.aria_snapshot().await
	}

	async fn child_frame(&self, local_ref: &str) -> Result<Arc<dyn Frame>> {
		self.frame.child_frame(local_ref).await
	}

	async fn locate(&self, local_ref: &str) -> Result<Arc<dyn Element>> {
		self.frame.locate(local_ref).await
	}
}

#[async_trait]
impl Page for FakePage {
	fn guid(&self) -> &str {
		&self.guid
	}

	fn subscribe(&self) -> EventReceiver<PageEvent> {
		self.events.subscribe()
	}

	fn main_frame(self: Arc<Self>) -> Arc<dyn Frame> {
		self
	}

	fn url(&self) -> String {
		self.location.lock().0.clone()
	}

	async fn title(&self) -> Result<String> {
		Ok(self.location.lock().1.clone())
	}

	async fn goto(&self, url: &str, wait_until: LoadState) -> Result<()> {
		self.record(format!("goto {url} {wait_until}"));
		self.location.lock().0 = url.to_string();
		self.emit(PageEvent::FrameNavigated { main_frame: true });
		Ok(())
	}

	async fn wait_for_load_state(&self, state: LoadState, timeout: Duration) -> Result<()> {
		self.record(format!("wait {state} {}ms", timeout.as_millis()));
		match self.load_failure.lock().clone() {
			Some(message) => Err(Error::Timeout(message)),
			None => Ok(()),
		}
	}

	async fn go_back(&self) -> Result<()> {
		self.record("go_back".into());
		self.emit(PageEvent::FrameNavigated { main_frame: true });
		Ok(())
	}

	async fn go_forward(&self) -> Result<()> {
		self.record("go_forward".into());
		self.emit(PageEvent::FrameNavigated { main_frame: true });
		Ok(())
	}

	async fn bring_to_front(&self) -> Result<()> {
		self.record("bring_to_front".into());
		Ok(())
	}

	async fn close(&self) -> Result<()> {
		self.record("close".into());
		if !self.closed.swap(true, Ordering::SeqCst) {
			self.emit(PageEvent::Close);
		}
		Ok(())
	}

	fn set_default_timeout(&self, timeout: Duration) {
		self.timeouts.lock().0 = Some(timeout);
	}

	fn set_default_navigation_timeout(&self, timeout: Duration) {
		self.timeouts.lock().1 = Some(timeout);
	}

	async fn press_key(&self, key: &str) -> Result<()> {
		self.record(format!("press {key}"));
		Ok(())
	}

	async fn screenshot(&self, options: &ScreenshotOptions) -> Result<Vec<u8>> {
		let format = match options.format {
			ScreenshotFormat::Png => "png",
			ScreenshotFormat::Jpeg => "jpeg",
		};
		self.record(format!("screenshot {format} {:?}", options.quality));
		Ok(b"image-bytes".to_vec())
	}

	async fn pdf(&self, path: &Path) -> Result<()> {
		self.record(format!("pdf {}", path.display()));
		Ok(())
	}

	async fn evaluate(&self, expression: &str) -> Result<Value> {
		self.record(format!("evaluate {expression}"));
		Ok(self.evaluate_result.lock().clone())
	}
}

/// Shared record of `close` calls, in call order.
type CloseLog = Arc<Mutex<Vec<&'static str>>>;

pub struct FakeContext {
	pages: Mutex<Vec<Arc<FakePage>>>,
	events: EventStream<ContextEvent>,
	counter: AtomicUsize,
	closed: AtomicBool,
	default_snapshot: String,
	close_log: CloseLog,
	close_failure: Mutex<Option<String>>,
	page_failure: Mutex<Option<String>>,
}

impl FakeContext {
	pub fn new() -> Arc<Self> {
		Self::with_close_log(CloseLog::default())
	}

	fn with_close_log(close_log: CloseLog) -> Arc<Self> {
		Arc::new(Self {
			pages: Mutex::new(Vec::new()),
			events: EventStream::new(),
			counter: AtomicUsize::new(0),
			closed: AtomicBool::new(false),
			default_snapshot: "- document [ref=e1]".to_string(),
			close_log,
			close_failure: Mutex::new(None),
			page_failure: Mutex::new(None),
		})
	}

	/// Makes `close` fail after marking the context closed.
	pub fn fail_close(&self, message: &str) {
		*self.close_failure.lock() = Some(message.to_string());
	}

	pub fn fail_new_page(&self, message: &str) {
		*self.page_failure.lock() = Some(message.to_string());
	}

	/// Every page opened in this context, including closed ones.
	pub fn fake_pages(&self) -> Vec<Arc<FakePage>> {
		self.pages.lock().clone()
	}

	/// Opens a page the way a popup would: announced, but not requested.
	pub fn open_popup(&self) -> Arc<FakePage> {
		self.open()
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	fn open(&self) -> Arc<FakePage> {
		let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
		let page = FakePage::new(&format!("page@{n}"), &self.default_snapshot);
		page.set_location(&format!("about:blank#{n}"), &format!("Page {n}"));
		self.pages.lock().push(Arc::clone(&page));
		self.events.emit(ContextEvent::Page(page.clone()));
		page
	}
}

#[async_trait]
impl BrowserContext for FakeContext {
	fn subscribe(&self) -> EventReceiver<ContextEvent> {
		self.events.subscribe()
	}

	async fn new_page(&self) -> Result<Arc<dyn Page>> {
		if self.is_closed() {
			return Err(Error::engine("Target page, context or browser has been closed"));
		}
		if let Some(message) = self.page_failure.lock().clone() {
			return Err(Error::engine(message));
		}
		Ok(self.open())
	}

	async fn close(&self) -> Result<()> {
		self.close_log.lock().push("context");
		self.closed.store(true, Ordering::SeqCst);
		match self.close_failure.lock().clone() {
			Some(message) => Err(Error::engine(message)),
			None => Ok(()),
		}
	}
}

pub struct FakeBrowser {
	contexts: Mutex<Vec<Arc<FakeContext>>>,
	closed: AtomicBool,
	close_log: CloseLog,
}

impl FakeBrowser {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			contexts: Mutex::new(Vec::new()),
			closed: AtomicBool::new(false),
			close_log: CloseLog::default(),
		})
	}

	/// Adds a context that exists before anyone connects.
	pub fn add_context(&self) -> Arc<FakeContext> {
		let context = FakeContext::with_close_log(Arc::clone(&self.close_log));
		self.contexts.lock().push(Arc::clone(&context));
		context
	}

	pub fn fake_contexts(&self) -> Vec<Arc<FakeContext>> {
		self.contexts.lock().clone()
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// `close` calls on this browser and its contexts, e.g. `["context", "browser"]`.
	pub fn close_order(&self) -> Vec<&'static str> {
		self.close_log.lock().clone()
	}
}

#[async_trait]
impl Browser for FakeBrowser {
	async fn new_context(&self) -> Result<Arc<dyn BrowserContext>> {
		Ok(self.add_context())
	}

	fn contexts(&self) -> Vec<Arc<dyn BrowserContext>> {
		self.contexts.lock().iter().map(|c| Arc::clone(c) as Arc<dyn BrowserContext>).collect()
	}

	async fn close(&self) -> Result<()> {
		self.close_log.lock().push("browser");
		self.closed.store(true, Ordering::SeqCst);
		Ok(())
	}
}

/// Engine whose sessions live entirely in memory.
pub struct FakeEngine {
	pub browser: Arc<FakeBrowser>,
	calls: Mutex<Vec<String>>,
	launched: Mutex<Vec<Arc<FakeContext>>>,
	launch_failure: Mutex<Option<String>>,
	page_failure: Mutex<Option<String>>,
}

impl FakeEngine {
	pub fn new() -> Arc<Self> {
		Arc::new(Self {
			browser: FakeBrowser::new(),
			calls: Mutex::new(Vec::new()),
			launched: Mutex::new(Vec::new()),
			launch_failure: Mutex::new(None),
			page_failure: Mutex::new(None),
		})
	}

	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().clone()
	}

	/// Persistent contexts launched so far, oldest first.
	pub fn launched(&self) -> Vec<Arc<FakeContext>> {
		self.launched.lock().clone()
	}

	pub fn fail_launch(&self, message: &str) {
		*self.launch_failure.lock() = Some(message.to_string());
	}

	/// Contexts launched from now on refuse to open pages.
	pub fn fail_new_page(&self, message: &str) {
		*self.page_failure.lock() = Some(message.to_string());
	}
}

#[async_trait]
impl Engine for FakeEngine {
	async fn connect(&self, browser: BrowserName, endpoint: &str) -> Result<Arc<dyn Browser>> {
		self.calls.lock().push(format!("connect {browser} {endpoint}"));
		Ok(self.browser.clone())
	}

	async fn connect_over_cdp(&self, endpoint: &str) -> Result<Arc<dyn Browser>> {
		self.calls.lock().push(format!("cdp {endpoint}"));
		Ok(self.browser.clone())
	}

	async fn launch_persistent_context(&self, browser: BrowserName, user_data_dir: &Path, _options: &LaunchOptions) -> Result<Arc<dyn BrowserContext>> {
		self.calls.lock().push(format!("launch {browser} {}", user_data_dir.display()));
		if let Some(message) = self.launch_failure.lock().clone() {
			return Err(Error::engine(message));
		}
		let context = FakeContext::new();
		if let Some(message) = self.page_failure.lock().clone() {
			context.fail_new_page(&message);
		}
		self.launched.lock().push(Arc::clone(&context));
		Ok(context)
	}
}
