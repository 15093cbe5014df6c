//! Provider and session identity types.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a configured provider (e.g. `"chatgpt"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ProviderId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for ProviderId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

impl From<String> for ProviderId {
	fn from(id: String) -> Self {
		Self(id)
	}
}

impl AsRef<str> for ProviderId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl Borrow<str> for ProviderId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

/// Opaque identifier of a live session, assigned by the host that opened it.
///
/// In the browser extension this is the numeric tab id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Load state of a session as last observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
	/// The session is still loading its page.
	Loading,
	/// The session finished loading and accepts messages.
	Ready,
	/// The host reported a state this crate does not model.
	#[default]
	Unknown,
}

impl LoadState {
	/// Maps a `chrome.tabs.Tab.status` string onto a load state.
	pub fn from_tab_status(status: &str) -> Self {
		match status {
			"complete" => Self::Ready,
			"loading" => Self::Loading,
			_ => Self::Unknown,
		}
	}

	pub fn is_ready(self) -> bool {
		self == Self::Ready
	}
}

impl fmt::Display for LoadState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LoadState::Loading => write!(f, "loading"),
			LoadState::Ready => write!(f, "ready"),
			LoadState::Unknown => write!(f, "unknown"),
		}
	}
}

/// Static description of one configured chat endpoint.
///
/// Serialized with the field names used by provider config files:
/// `{"id": "claude", "name": "Claude", "url": "https://claude.ai", "icon": "🎭"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
	/// Unique key.
	pub id: ProviderId,
	/// Human-readable name shown by UIs.
	#[serde(rename = "name")]
	pub display_name: String,
	/// Address used to open a session for this provider.
	#[serde(rename = "url")]
	pub endpoint: String,
	/// Optional glyph shown next to the name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub icon: Option<String>,
	/// Whether the provider takes part in all-target dispatch.
	#[serde(default = "default_enabled")]
	pub enabled: bool,
}

fn default_enabled() -> bool {
	true
}

impl ProviderDescriptor {
	pub fn new(id: impl Into<ProviderId>, display_name: impl Into<String>, endpoint: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			display_name: display_name.into(),
			endpoint: endpoint.into(),
			icon: None,
			enabled: true,
		}
	}

	pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
		self.icon = Some(icon.into());
		self
	}

	pub fn with_enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;
		self
	}
}
