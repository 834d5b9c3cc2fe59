//! Engine-neutral value types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Browser engine family used to connect or launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserName {
	#[default]
	Chromium,
	Firefox,
	Webkit,
}

impl BrowserName {
	pub fn as_str(self) -> &'static str {
		match self {
			BrowserName::Chromium => "chromium",
			BrowserName::Firefox => "firefox",
			BrowserName::Webkit => "webkit",
		}
	}
}

impl fmt::Display for BrowserName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl std::str::FromStr for BrowserName {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_ascii_lowercase().as_str() {
			"chromium" | "chrome" => Ok(BrowserName::Chromium),
			"firefox" => Ok(BrowserName::Firefox),
			"webkit" => Ok(BrowserName::Webkit),
			other => Err(format!("unknown browser '{other}' (expected chromium, firefox or webkit)")),
		}
	}
}

/// Page lifecycle milestones a navigation can wait for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
	/// `DOMContentLoaded` fired; the page is usable.
	#[serde(rename = "domcontentloaded")]
	DomContentLoaded,
	/// The `load` event fired.
	#[default]
	Load,
	/// No network connections for at least 500 ms.
	#[serde(rename = "networkidle")]
	NetworkIdle,
}

impl fmt::Display for LoadState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			LoadState::DomContentLoaded => "domcontentloaded",
			LoadState::Load => "load",
			LoadState::NetworkIdle => "networkidle",
		};
		f.write_str(name)
	}
}

/// Severity attached to a console message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
	#[default]
	Log,
	Debug,
	Info,
	Warning,
	Error,
}

impl fmt::Display for ConsoleLevel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ConsoleLevel::Log => "LOG",
			ConsoleLevel::Debug => "DEBUG",
			ConsoleLevel::Info => "INFO",
			ConsoleLevel::Warning => "WARNING",
			ConsoleLevel::Error => "ERROR",
		};
		f.write_str(name)
	}
}

/// A console message raised by a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleMessage {
	#[serde(rename = "type", default)]
	pub level: ConsoleLevel,
	pub text: String,
}

impl ConsoleMessage {
	pub fn new(level: ConsoleLevel, text: impl Into<String>) -> Self {
		Self { level, text: text.into() }
	}
}

impl fmt::Display for ConsoleMessage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "[{}] {}", self.level, self.text)
	}
}
