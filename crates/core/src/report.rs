//! Outcome of one agent step, as handed to the tool layer.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One block of report content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Content {
	Text {
		text: String,
	},
	/// Base64-encoded image.
	#[serde(rename_all = "camelCase")]
	Image {
		data: String,
		mime_type: String,
	},
}

/// Result of a step: content plus a success/failure flag.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
	pub content: Vec<Content>,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub is_error: bool,
}

impl Report {
	pub fn text(text: impl Into<String>) -> Self {
		Self {
			content: vec![Content::Text { text: text.into() }],
			is_error: false,
		}
	}

	pub fn image(data: String, mime_type: impl Into<String>) -> Self {
		Self {
			content: vec![Content::Image {
				data,
				mime_type: mime_type.into(),
			}],
			is_error: false,
		}
	}

	pub fn error(text: impl Into<String>) -> Self {
		Self {
			is_error: true,
			..Self::text(text)
		}
	}

	pub fn from_error(err: &Error) -> Self {
		Self::error(err.to_string())
	}

	/// Text blocks joined by newlines; images are skipped.
	pub fn text_content(&self) -> String {
		self.content
			.iter()
			.filter_map(|c| match c {
				Content::Text { text } => Some(text.as_str()),
				Content::Image { .. } => None,
			})
			.collect::<Vec<_>>()
			.join("\n")
	}
}

impl From<crate::Result<Report>> for Report {
	fn from(result: crate::Result<Report>) -> Self {
		result.unwrap_or_else(|err| Report::from_error(&err))
	}
}
