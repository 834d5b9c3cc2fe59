//! Ref-based interaction steps.
//!
//! Each step takes its parameters in the JSON shape the tool layer
//! receives, acts on the current tab and always produces a [`Report`];
//! failures become error reports instead of propagating.

use std::future::Future;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures::future::BoxFuture;
use pw_agent_protocol::ScreenshotOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::report::Report;
use crate::tab::{RunOptions, Tab, render_console};

/// Longest pause [`wait`] will honor.
const MAX_WAIT: Duration = Duration::from_secs(10);

/// JPEG quality for screenshots that are not raw.
const SCREENSHOT_QUALITY: u8 = 50;

/// An element picked from the last snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementParams {
	/// Human-readable description, echoed in the status line.
	pub element: String,
	/// Ref from the most recent snapshot.
	#[serde(rename = "ref")]
	pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragParams {
	pub start_element: String,
	pub start_ref: String,
	pub end_element: String,
	pub end_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeParams {
	#[serde(flatten)]
	pub target: ElementParams,
	pub text: String,
	/// Press Enter after typing.
	#[serde(default)]
	pub submit: bool,
	/// Type one character at a time so key handlers fire.
	#[serde(default)]
	pub slowly: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectOptionParams {
	#[serde(flatten)]
	pub target: ElementParams,
	pub values: Vec<String>,
}

fn noop(_tab: &mut Tab) -> BoxFuture<'_, Result<()>> {
	Box::pin(async { Ok(()) })
}

async fn report(step: impl Future<Output = Result<Report>>) -> Report {
	step.await.into()
}

/// Captures and reports a fresh snapshot of the current tab.
pub async fn snapshot(context: &mut Context) -> Report {
	report(async { context.current_tab()?.run(noop, RunOptions::new().capture_snapshot(true)).await }).await
}

pub async fn click(context: &mut Context, params: ElementParams) -> Report {
	let status = format!("Clicked \"{}\"", params.element);
	report(async {
		let reference = params.reference;
		context
			.current_tab()?
			.run_and_wait_with_snapshot(
				move |tab| {
					Box::pin(async move {
						let element = tab.last_snapshot()?.resolve(&reference).await?;
						element.click().await
					})
				},
				RunOptions::new().status(status),
			)
			.await
	})
	.await
}

pub async fn hover(context: &mut Context, params: ElementParams) -> Report {
	let status = format!("Hovered over \"{}\"", params.element);
	report(async {
		let reference = params.reference;
		context
			.current_tab()?
			.run_and_wait_with_snapshot(
				move |tab| {
					Box::pin(async move {
						let element = tab.last_snapshot()?.resolve(&reference).await?;
						element.hover().await
					})
				},
				RunOptions::new().status(status),
			)
			.await
	})
	.await
}

pub async fn drag(context: &mut Context, params: DragParams) -> Report {
	let status = format!("Dragged \"{}\" to \"{}\"", params.start_element, params.end_element);
	report(async {
		let DragParams { start_ref, end_ref, .. } = params;
		context
			.current_tab()?
			.run_and_wait_with_snapshot(
				move |tab| {
					Box::pin(async move {
						let snapshot = tab.last_snapshot()?;
						let source = snapshot.resolve(&start_ref).await?;
						let target = snapshot.resolve(&end_ref).await?;
						source.drag_to(target.as_ref()).await
					})
				},
				RunOptions::new().status(status),
			)
			.await
	})
	.await
}

/// Fills (or types, when `slowly`) text into an element, optionally submitting with Enter.
pub async fn type_text(context: &mut Context, params: TypeParams) -> Report {
	let status = format!("Typed \"{}\" into \"{}\"", params.text, params.target.element);
	report(async {
		let TypeParams { target, text, submit, slowly } = params;
		context
			.current_tab()?
			.run_and_wait_with_snapshot(
				move |tab| {
					Box::pin(async move {
						let element = tab.last_snapshot()?.resolve(&target.reference).await?;
						if slowly {
							element.press_sequentially(&text).await?;
						} else {
							element.fill(&text).await?;
						}
						if submit {
							element.press("Enter").await?;
						}
						Ok(())
					})
				},
				RunOptions::new().status(status),
			)
			.await
	})
	.await
}

pub async fn select_option(context: &mut Context, params: SelectOptionParams) -> Report {
	let status = format!("Selected option in \"{}\"", params.target.element);
	report(async {
		let SelectOptionParams { target, values } = params;
		context
			.current_tab()?
			.run_and_wait_with_snapshot(
				move |tab| {
					Box::pin(async move {
						let element = tab.last_snapshot()?.resolve(&target.reference).await?;
						element.select_option(&values).await.map(|_| ())
					})
				},
				RunOptions::new().status(status),
			)
			.await
	})
	.await
}

/// Navigates the current tab, opening one (and a session) when needed.
pub async fn navigate(context: &mut Context, url: &str, capture_snapshot: bool) -> Report {
	let status = format!("Navigated to {url}");
	let url = url.to_string();
	report(async {
		info!(target = "pw.tab", %url, "navigate");
		context
			.ensure_tab()
			.await?
			.run(
				move |tab| Box::pin(async move { tab.navigate(&url).await }),
				RunOptions::new().status(status).capture_snapshot(capture_snapshot),
			)
			.await
	})
	.await
}

pub async fn go_back(context: &mut Context, capture_snapshot: bool) -> Report {
	report(async {
		context
			.current_tab()?
			.run_and_wait(
				|tab| Box::pin(async move { tab.page().go_back().await }),
				RunOptions::new().status("Navigated back").capture_snapshot(capture_snapshot),
			)
			.await
	})
	.await
}

pub async fn go_forward(context: &mut Context, capture_snapshot: bool) -> Report {
	report(async {
		context
			.current_tab()?
			.run_and_wait(
				|tab| Box::pin(async move { tab.page().go_forward().await }),
				RunOptions::new().status("Navigated forward").capture_snapshot(capture_snapshot),
			)
			.await
	})
	.await
}

pub async fn press_key(context: &mut Context, key: &str, capture_snapshot: bool) -> Report {
	let status = format!("Pressed key {key}");
	let key = key.to_string();
	report(async {
		context
			.current_tab()?
			.run_and_wait(
				move |tab| Box::pin(async move { tab.page().press_key(&key).await }),
				RunOptions::new().status(status).capture_snapshot(capture_snapshot),
			)
			.await
	})
	.await
}

/// Answers the pending file chooser with `paths`.
pub async fn choose_file(context: &mut Context, paths: Vec<PathBuf>, capture_snapshot: bool) -> Report {
	let listed: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
	let status = format!("Chose files {}", listed.join(", "));
	report(async {
		context
			.current_tab()?
			.run_and_wait(
				move |tab| Box::pin(async move { tab.submit_file_chooser(&paths).await }),
				RunOptions::new()
					.status(status)
					.capture_snapshot(capture_snapshot)
					.keep_file_chooser(),
			)
			.await
	})
	.await
}

/// Screenshot of the current tab: JPEG by default, lossless PNG when `raw`.
pub async fn screenshot(context: &mut Context, raw: bool) -> Report {
	report(async {
		let tab = context.current_tab()?;
		let options = if raw {
			ScreenshotOptions::png()
		} else {
			ScreenshotOptions::jpeg(SCREENSHOT_QUALITY)
		};
		let bytes = tab.page().screenshot(&options).await?;
		Ok(Report::image(STANDARD.encode(bytes), options.format.mime_type()))
	})
	.await
}

/// Prints the current page to a timestamped PDF in the temp directory.
pub async fn save_as_pdf(context: &mut Context) -> Report {
	report(async {
		let tab = context.current_tab()?;
		let stamp = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or_default();
		let path = std::env::temp_dir().join(format!("page-{stamp}.pdf"));
		tab.page().pdf(&path).await?;
		Ok(Report::text(format!("Saved as {}", path.display())))
	})
	.await
}

/// Runs `code` as a function body in the page and reports its return value.
pub async fn evaluate(context: &mut Context, code: &str) -> Report {
	report(async {
		let tab = context.current_tab()?;
		let expression = format!("(() => {{ {code} }})()");
		let value = tab.page().evaluate(&expression).await?;
		Ok(Report::text(render_value(&value)?))
	})
	.await
}

fn render_value(value: &Value) -> Result<String> {
	Ok(match value {
		Value::String(text) => text.clone(),
		Value::Array(_) | Value::Object(_) => serde_json::to_string_pretty(value)?,
		other => other.to_string(),
	})
}

/// Opens a tab, optionally navigates it, and reports its snapshot.
pub async fn new_tab(context: &mut Context, url: Option<&str>) -> Report {
	report(async {
		let mut tab = context.new_tab().await?;
		if let Some(url) = url {
			tab.navigate(url).await?;
		}
		tab.run(noop, RunOptions::new().capture_snapshot(true)).await
	})
	.await
}

pub async fn select_tab(context: &mut Context, index: usize, capture_snapshot: bool) -> Report {
	report(async {
		context.select_tab(index).await?;
		context.ensure_tab().await?.run(noop, RunOptions::new().capture_snapshot(capture_snapshot)).await
	})
	.await
}

/// Closes a tab and reports the tab that is current afterwards, or the
/// remaining tab list when none is.
pub async fn close_tab(context: &mut Context, index: Option<usize>, capture_snapshot: bool) -> Report {
	report(async {
		let listing = context.close_tab(index).await?;
		match context.current_tab() {
			Ok(tab) => tab.run(noop, RunOptions::new().capture_snapshot(capture_snapshot)).await,
			Err(Error::NoCurrentTab) => Ok(Report::text(listing)),
			Err(err) => Err(err),
		}
	})
	.await
}

pub async fn list_tabs(context: &mut Context) -> Report {
	report(async { Ok(Report::text(context.list_tabs().await?)) }).await
}

/// Console messages of the current tab since its last navigation.
pub async fn console(context: &mut Context) -> Report {
	report(async { Ok(Report::text(render_console(context.current_tab()?.console()))) }).await
}

/// Sleeps for `seconds`, capped at ten seconds.
pub async fn wait(seconds: f64) -> Report {
	let requested = Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(MAX_WAIT);
	tokio::time::sleep(requested.min(MAX_WAIT)).await;
	Report::text(format!("Waited for {seconds} seconds"))
}

/// Closes the browser session.
pub async fn close(context: &mut Context) -> Report {
	report(async {
		context.close().await?;
		Ok(Report::text("Page closed"))
	})
	.await
}

pub async fn install(context: &Context) -> Report {
	report(async {
		let channel = context.install().await?;
		Ok(Report::text(format!("Browser {channel} installed")))
	})
	.await
}
