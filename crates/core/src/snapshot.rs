//! Page snapshots and snapshot refs.
//!
//! A [`PageSnapshot`] flattens a page and every frame nested inside it into
//! one YAML accessibility tree. Each frame reports refs numbered locally
//! (`[ref=e5]`); while walking the tree the builder records every frame it
//! visits in a frame table and rewrites refs of frame `i > 0` to
//! `[ref=f<i>e5]`, which makes every ref unique within the snapshot.
//!
//! [`PageSnapshot::resolve`] reverses the mapping: the `f<i>` prefix picks
//! the frame table entry and the remainder is handed to that frame.
//!
//! Refs are only meaningful for the snapshot that produced them.

use std::sync::{Arc, LazyLock};

use futures::future::BoxFuture;
use regex::Regex;
use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::engine::{Element, Frame, Page};
use crate::error::{Error, Result};

/// Nesting limit for iframe recursion; deeper frames get the failure sentinel.
const MAX_FRAME_DEPTH: usize = 16;

/// Substituted for an iframe whose content could not be captured.
pub const IFRAME_UNAVAILABLE: &str = "<could not take iframe snapshot>";

/// Note shown while a file chooser blocks other interactions.
pub const FILE_CHOOSER_NOTE: &str = "- There is a file chooser visible that requires browser_choose_file to be called";

static LOCAL_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[ref=([^\]]+)\]").expect("static regex"));
static FRAME_REF: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^f(\d+)(.*)$").expect("static regex"));

/// Immutable capture of one page and its frames.
pub struct PageSnapshot {
	frames: Vec<Arc<dyn Frame>>,
	text: String,
}

impl PageSnapshot {
	/// Captures `page` and, recursively, every iframe reachable from it.
	///
	/// Failures inside nested frames are replaced by [`IFRAME_UNAVAILABLE`];
	/// only a failure of the main frame itself is returned as an error.
	pub async fn capture(page: &Arc<dyn Page>) -> Result<Self> {
		let mut builder = SnapshotBuilder::default();
		let main_frame = Arc::clone(page).main_frame();
		let document = builder.capture_frame(main_frame, 0).await?;

		let url = page.url();
		let title = page.title().await?;
		let text = render_document(&url, &title, &document)?;
		debug!(target = "pw.snapshot", %url, frames = builder.frames.len(), "captured page snapshot");

		Ok(Self {
			frames: builder.frames,
			text,
		})
	}

	/// Rendered snapshot: URL, title and the fenced YAML tree.
	pub fn text(&self) -> &str {
		&self.text
	}

	/// Number of frames visited while building this snapshot.
	pub fn frame_count(&self) -> usize {
		self.frames.len()
	}

	/// Resolves a snapshot ref to a live element.
	///
	/// Fails with [`Error::FrameNotFound`] when the encoded frame index is
	/// outside the frame table. Lookup failures inside the frame (detached
	/// element, stale ref) surface as engine errors.
	pub async fn resolve(&self, reference: &str) -> Result<Arc<dyn Element>> {
		let (index, local_ref) = split_ref(reference);
		let frame = index.and_then(|i| self.frames.get(i)).ok_or_else(|| Error::FrameNotFound {
			reference: reference.to_string(),
		})?;
		frame.locate(local_ref).await
	}

	/// Renders the snapshot for a report, preceded by an optional status
	/// line and the file chooser note.
	pub fn render(&self, status: Option<&str>, has_file_chooser: bool) -> String {
		let mut lines = Vec::new();
		if let Some(status) = status {
			lines.push(status);
			lines.push("");
		}
		if has_file_chooser {
			lines.push(FILE_CHOOSER_NOTE);
			lines.push("");
		}
		lines.push(&self.text);
		lines.join("\n")
	}
}

impl std::fmt::Debug for PageSnapshot {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("PageSnapshot").field("frames", &self.frames.len()).field("text", &self.text).finish()
	}
}

/// Walks the frame tree once, filling the frame table as frames are visited.
#[derive(Default)]
struct SnapshotBuilder {
	frames: Vec<Arc<dyn Frame>>,
}

impl SnapshotBuilder {
	fn capture_frame(&mut self, frame: Arc<dyn Frame>, depth: usize) -> BoxFuture<'_, Result<Value>> {
		Box::pin(async move {
			let index = self.frames.len();
			self.frames.push(Arc::clone(&frame));

			let raw = frame.aria_snapshot().await?;
			if raw.trim().is_empty() {
				return Ok(Value::Null);
			}
			let document: Value = serde_yaml::from_str(&raw)?;
			Ok(self.visit(document, &frame, index, depth).await)
		})
	}

	fn visit<'a>(&'a mut self, node: Value, frame: &'a Arc<dyn Frame>, index: usize, depth: usize) -> BoxFuture<'a, Value> {
		Box::pin(async move {
			match node {
				Value::Sequence(items) => {
					let mut visited = Vec::with_capacity(items.len());
					for item in items {
						visited.push(self.visit(item, frame, index, depth).await);
					}
					Value::Sequence(visited)
				}
				Value::Mapping(map) => {
					let mut visited = Mapping::with_capacity(map.len());
					for (key, value) in map {
						let key = match key {
							Value::String(text) => Value::String(prefix_refs(&text, index)),
							other => other,
						};
						let value = self.visit(value, frame, index, depth).await;
						visited.insert(key, value);
					}
					Value::Mapping(visited)
				}
				Value::String(text) => self.visit_scalar(text, frame, index, depth).await,
				other => other,
			}
		})
	}

	/// Rewrites refs in a scalar and expands `iframe` placeholders in place.
	async fn visit_scalar(&mut self, text: String, frame: &Arc<dyn Frame>, index: usize, depth: usize) -> Value {
		let rewritten = prefix_refs(&text, index);
		if !text.starts_with("iframe ") {
			return Value::String(rewritten);
		}
		let Some(local_ref) = LOCAL_REF.captures(&text).and_then(|c| c.get(1)).map(|m| m.as_str().to_string()) else {
			return Value::String(rewritten);
		};

		let child = if depth + 1 >= MAX_FRAME_DEPTH {
			warn!(target = "pw.snapshot", depth, %local_ref, "iframe nesting too deep; not descending");
			Value::String(IFRAME_UNAVAILABLE.to_string())
		} else {
			match frame.child_frame(&local_ref).await {
				Ok(child) => match self.capture_frame(child, depth + 1).await {
					Ok(Value::Null) => return Value::String(rewritten),
					Ok(document) => document,
					Err(err) => {
						debug!(target = "pw.snapshot", %local_ref, error = %err, "iframe snapshot failed");
						Value::String(IFRAME_UNAVAILABLE.to_string())
					}
				},
				Err(err) => {
					debug!(target = "pw.snapshot", %local_ref, error = %err, "iframe not reachable");
					Value::String(IFRAME_UNAVAILABLE.to_string())
				}
			}
		};

		let mut pair = Mapping::with_capacity(1);
		pair.insert(Value::String(rewritten), child);
		Value::Mapping(pair)
	}
}

/// Inserts the `f<index>` frame prefix after every `ref=` marker.
fn prefix_refs(text: &str, index: usize) -> String {
	if index == 0 {
		return text.to_string();
	}
	text.replace("[ref=", &format!("[ref=f{index}"))
}

/// Splits a snapshot ref into its frame index and frame-local ref.
///
/// Returns `None` for the index when the prefix does not fit in `usize`.
fn split_ref(reference: &str) -> (Option<usize>, &str) {
	match FRAME_REF.captures(reference) {
		Some(caps) => {
			let index = caps.get(1).and_then(|m| m.as_str().parse().ok());
			let local = caps.get(2).map_or("", |m| m.as_str());
			(index, local)
		}
		None => (Some(0), reference),
	}
}

fn render_document(url: &str, title: &str, document: &Value) -> Result<String> {
	let yaml = match document {
		Value::Null => String::new(),
		other => serde_yaml::to_string(other)?,
	};
	let lines = [
		format!("- Page URL: {url}"),
		format!("- Page Title: {title}"),
		"- Page Snapshot".to_string(),
		"```yaml".to_string(),
		yaml.trim().to_string(),
		"```".to_string(),
		String::new(),
	];
	Ok(lines.join("\n"))
}
