//! Static provider configuration and dispatch timing options.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use promptcast_protocol::ProviderDescriptor;

use crate::error::{Error, Result};

/// Default interval between readiness probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default bound on waiting for a session to become ready.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on a single send acknowledgment.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Timing knobs for dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
	pub poll_interval: Duration,
	pub ready_timeout: Duration,
	pub send_timeout: Duration,
}

impl Default for DispatchOptions {
	fn default() -> Self {
		Self {
			poll_interval: DEFAULT_POLL_INTERVAL,
			ready_timeout: DEFAULT_READY_TIMEOUT,
			send_timeout: DEFAULT_SEND_TIMEOUT,
		}
	}
}

impl DispatchOptions {
	pub fn with_poll_interval(mut self, interval: Duration) -> Self {
		self.poll_interval = interval;
		self
	}

	pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
		self.ready_timeout = timeout;
		self
	}

	pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
		self.send_timeout = timeout;
		self
	}
}

/// The configured provider set. Validated once, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSet {
	providers: Vec<ProviderDescriptor>,
}

impl ProviderSet {
	/// Validates and wraps `providers`.
	///
	/// # Errors
	///
	/// Returns [`Error::Config`] if the set is empty, an id or URL is blank,
	/// or an id appears twice.
	pub fn new(providers: Vec<ProviderDescriptor>) -> Result<Self> {
		if providers.is_empty() {
			return Err(Error::Config("provider set is empty".to_string()));
		}

		let mut seen = HashSet::new();
		for provider in &providers {
			if provider.id.as_str().trim().is_empty() {
				return Err(Error::Config("provider id must not be blank".to_string()));
			}
			if provider.endpoint.trim().is_empty() {
				return Err(Error::Config(format!("provider {} has no url", provider.id)));
			}
			if !seen.insert(provider.id.as_str()) {
				return Err(Error::Config(format!("duplicate provider id: {}", provider.id)));
			}
		}

		Ok(Self { providers })
	}

	/// The providers shipped with the extension.
	pub fn builtin() -> Self {
		Self {
			providers: vec![
				ProviderDescriptor::new("chatgpt", "ChatGPT", "https://chat.openai.com").with_icon("🤖"),
				ProviderDescriptor::new("claude", "Claude", "https://claude.ai").with_icon("🎭"),
				ProviderDescriptor::new("gemini", "Gemini", "https://gemini.google.com").with_icon("✨"),
				ProviderDescriptor::new("perplexity", "Perplexity", "https://www.perplexity.ai").with_icon("🔍"),
				ProviderDescriptor::new("grok", "Grok", "https://x.ai/grok").with_icon("🦅"),
			],
		}
	}

	/// Parses a JSON array of provider descriptors.
	pub fn from_json(raw: &str) -> Result<Self> {
		let providers: Vec<ProviderDescriptor> = serde_json::from_str(raw)?;
		Self::new(providers)
	}

	/// Loads a JSON provider file.
	pub fn load(path: &Path) -> Result<Self> {
		let raw = std::fs::read_to_string(path)
			.map_err(|err| Error::Config(format!("failed to read {}: {err}", path.display())))?;
		Self::from_json(&raw)
	}

	pub fn get(&self, id: &str) -> Option<&ProviderDescriptor> {
		self.providers.iter().find(|p| p.id.as_str() == id)
	}

	pub fn all(&self) -> &[ProviderDescriptor] {
		&self.providers
	}

	pub fn enabled(&self) -> impl Iterator<Item = &ProviderDescriptor> {
		self.providers.iter().filter(|p| p.enabled)
	}

	pub fn len(&self) -> usize {
		self.providers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.providers.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn builtin_set_is_valid_and_enabled() {
		let set = ProviderSet::builtin();
		assert_eq!(set.len(), 5);
		assert_eq!(set.enabled().count(), 5);
		assert!(ProviderSet::new(set.all().to_vec()).is_ok());
		assert_eq!(set.get("claude").unwrap().endpoint, "https://claude.ai");
	}

	#[test]
	fn duplicate_ids_are_rejected() {
		let err = ProviderSet::new(vec![
			ProviderDescriptor::new("chat", "Chat", "https://a.test"),
			ProviderDescriptor::new("chat", "Chat 2", "https://b.test"),
		])
		.unwrap_err();
		assert!(err.to_string().contains("duplicate provider id: chat"));
	}

	#[test]
	fn empty_set_is_rejected() {
		assert!(matches!(ProviderSet::new(vec![]), Err(Error::Config(_))));
	}

	#[test]
	fn json_loader_respects_enabled_flag() {
		let raw = r#"[
			{"id": "chat", "name": "Chat", "url": "https://chat.test"},
			{"id": "mirror", "name": "Mirror", "url": "https://mirror.test", "enabled": false}
		]"#;
		let set = ProviderSet::from_json(raw).unwrap();

		let enabled: Vec<_> = set.enabled().map(|p| p.id.as_str()).collect();
		assert_eq!(enabled, vec!["chat"]);
	}

	#[test]
	fn blank_url_is_rejected() {
		let raw = r#"[{"id": "chat", "name": "Chat", "url": "  "}]"#;
		assert!(matches!(ProviderSet::from_json(raw), Err(Error::Config(_))));
	}

	#[test]
	fn default_options_match_reference_timings() {
		let options = DispatchOptions::default();
		assert_eq!(options.poll_interval, Duration::from_millis(100));
		assert_eq!(options.ready_timeout, Duration::from_millis(10_000));
	}
}
