//! Request context and the message delivered to a provider session.

use serde::{Deserialize, Serialize};

/// Upper bound, in characters, on the page text carried with a prompt.
pub const MAX_PAGE_TEXT_CHARS: usize = 10_000;

/// A prompt plus the optional environment it was captured in.
///
/// Field names follow the page-context shape produced by the extension's
/// content script, so a captured page context deserializes directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
	/// Text to deliver. Must not be blank.
	pub prompt: String,
	/// URL of the page the prompt was issued from.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	/// Title of that page.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	/// Page text snippet, at most [`MAX_PAGE_TEXT_CHARS`] characters once normalized.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub content: Option<String>,
	/// The user's text selection.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub selected_text: Option<String>,
	/// Capture time, milliseconds since the Unix epoch.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<u64>,
}

impl RequestContext {
	pub fn new(prompt: impl Into<String>) -> Self {
		Self {
			prompt: prompt.into(),
			..Default::default()
		}
	}

	pub fn with_page(mut self, url: impl Into<String>, title: impl Into<String>) -> Self {
		self.url = Some(url.into());
		self.title = Some(title.into());
		self
	}

	pub fn with_content(mut self, content: impl Into<String>) -> Self {
		self.content = Some(content.into());
		self
	}

	pub fn with_selection(mut self, selection: impl Into<String>) -> Self {
		self.selected_text = Some(selection.into());
		self
	}

	pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
		self.timestamp = Some(timestamp_ms);
		self
	}

	/// Returns true when the prompt has non-whitespace text.
	pub fn has_prompt(&self) -> bool {
		!self.prompt.trim().is_empty()
	}

	/// Truncates the page text to [`MAX_PAGE_TEXT_CHARS`] on a char boundary.
	pub fn normalized(mut self) -> Self {
		if let Some(content) = self.content.as_mut() {
			if let Some((cut, _)) = content.char_indices().nth(MAX_PAGE_TEXT_CHARS) {
				content.truncate(cut);
			}
		}
		self
	}
}

/// Message delivered to the adapter running inside a provider session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum AdapterMessage {
	/// Inject `prompt` into the provider page and submit it.
	SendPrompt { prompt: String, context: RequestContext },
}

impl AdapterMessage {
	pub fn send_prompt(context: &RequestContext) -> Self {
		Self::SendPrompt {
			prompt: context.prompt.clone(),
			context: context.clone(),
		}
	}
}
