//! Error taxonomy for the snapshot, tab and session layers.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// An operation needed a tab but none is selected.
	#[error("No current tab. Navigate to a location to create a tab")]
	NoCurrentTab,

	/// A ref-based action was attempted before any snapshot was captured.
	#[error("No snapshot available. Capture a page snapshot first")]
	NoSnapshot,

	#[error("No file chooser visible")]
	NoFileChooser,

	/// The ref encodes a frame index outside the snapshot's frame table.
	#[error("Frame for ref '{reference}' does not exist. Provide ref from the most current snapshot")]
	FrameNotFound { reference: String },

	#[error("Tab index {index} is out of range ({count} tabs open)")]
	InvalidTabIndex { index: usize, count: usize },

	#[error("Browser specified in your config is not installed. Either install it (likely) or change the config")]
	BrowserNotInstalled,

	#[error("Failed to install browser: {output}")]
	InstallFailed { output: String },

	#[error("Invalid endpoint '{endpoint}': {reason}")]
	InvalidEndpoint { endpoint: String, reason: String },

	/// Engine timeout, message passed through verbatim.
	#[error("{0}")]
	Timeout(String),

	/// Failure reported by the underlying browser engine, passed through verbatim.
	#[error("{0}")]
	Engine(String),

	#[error("Configuration error: {0}")]
	Config(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Yaml(#[from] serde_yaml::Error),
}

impl Error {
	pub fn engine(message: impl Into<String>) -> Self {
		Error::Engine(message.into())
	}

	pub fn is_timeout(&self) -> bool {
		matches!(self, Error::Timeout(_))
	}

	/// Whether this is a caller-side validation failure rather than an engine failure.
	pub fn is_validation(&self) -> bool {
		matches!(
			self,
			Error::NoCurrentTab | Error::NoSnapshot | Error::NoFileChooser | Error::FrameNotFound { .. } | Error::InvalidTabIndex { .. }
		)
	}
}
