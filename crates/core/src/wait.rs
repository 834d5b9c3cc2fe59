//! Completion-wait policy for actions that may trigger navigation.
//!
//! After the action returns, the page events it produced are inspected. A
//! main-frame navigation means the page is still loading, so the `load`
//! milestone is awaited within the navigation timeout. Without one, network
//! requests the action started are given up to the completion cap to finish,
//! in case one of them turns into a navigation. A short settle delay
//! follows either way before the page is snapshotted.

use std::collections::HashSet;

use futures::future::BoxFuture;
use pw_agent_protocol::LoadState;
use tracing::debug;

use crate::engine::PageEvent;
use crate::error::Result;
use crate::tab::Tab;

/// Requests and navigations observed since the action started.
#[derive(Debug, Default)]
struct CompletionTracker {
	in_flight: HashSet<String>,
	navigated: bool,
	closed: bool,
}

impl CompletionTracker {
	fn observe(&mut self, event: &PageEvent) {
		match event {
			PageEvent::Request { id } => {
				self.in_flight.insert(id.clone());
			}
			PageEvent::RequestFinished { id } => {
				self.in_flight.remove(id);
			}
			PageEvent::FrameNavigated { main_frame: true } => self.navigated = true,
			PageEvent::Close => self.closed = true,
			_ => {}
		}
	}

	fn settled(&self) -> bool {
		self.navigated || self.closed || self.in_flight.is_empty()
	}
}

pub(crate) async fn wait_for_completion<F>(tab: &mut Tab, action: F) -> Result<()>
where
	F: for<'t> FnOnce(&'t mut Tab) -> BoxFuture<'t, Result<()>> + Send,
{
	tab.drain_events();
	action(&mut *tab).await?;

	let mut tracker = CompletionTracker::default();
	while let Some(event) = tab.try_next_event() {
		tracker.observe(&event);
	}

	if !tracker.settled() {
		let cap = tab.timeouts().completion_cap();
		let waited = tokio::time::timeout(cap, async {
			while !tracker.settled() {
				match tab.next_event().await {
					Some(event) => tracker.observe(&event),
					None => break,
				}
			}
		})
		.await;
		if waited.is_err() {
			debug!(
				target = "pw.tab",
				guid = %tab.guid(),
				pending = tracker.in_flight.len(),
				"requests still in flight after completion cap"
			);
		}
	}

	if tracker.navigated && !tracker.closed {
		let timeout = tab.timeouts().navigation();
		if let Err(err) = tab.page().wait_for_load_state(LoadState::Load, timeout).await {
			debug!(target = "pw.tab", guid = %tab.guid(), error = %err, "navigation did not reach load");
		}
	}

	let settle = tab.timeouts().settle();
	if !settle.is_zero() {
		tokio::time::sleep(settle).await;
	}
	Ok(())
}
