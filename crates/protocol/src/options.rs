//! Option payloads passed across the engine seam.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default action timeout applied to every page, in milliseconds.
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 5_000;

/// Default navigation timeout applied to every page, in milliseconds.
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 60_000;

/// Browser launch options.
///
/// Serialized as camelCase so the same JSON can be forwarded to a remote
/// endpoint as the `launch-options` query parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOptions {
	/// Distribution channel (e.g. `chrome`, `msedge`, `chrome-beta`).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub channel: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub headless: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub executable_path: Option<PathBuf>,
	/// Additional command-line arguments for the browser process.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub args: Vec<String>,
}

/// Image encoding for screenshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotFormat {
	Png,
	#[default]
	Jpeg,
}

impl ScreenshotFormat {
	pub fn mime_type(self) -> &'static str {
		match self {
			ScreenshotFormat::Png => "image/png",
			ScreenshotFormat::Jpeg => "image/jpeg",
		}
	}
}

/// Pixel scale used when capturing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenshotScale {
	#[default]
	Css,
	Device,
}

/// Screenshot capture options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotOptions {
	#[serde(rename = "type")]
	pub format: ScreenshotFormat,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub quality: Option<u8>,
	#[serde(default)]
	pub scale: ScreenshotScale,
}

impl ScreenshotOptions {
	/// Lossless PNG at CSS scale.
	pub fn png() -> Self {
		Self {
			format: ScreenshotFormat::Png,
			quality: None,
			scale: ScreenshotScale::Css,
		}
	}

	/// Compressed JPEG at CSS scale.
	pub fn jpeg(quality: u8) -> Self {
		Self {
			format: ScreenshotFormat::Jpeg,
			quality: Some(quality.min(100)),
			scale: ScreenshotScale::Css,
		}
	}
}
